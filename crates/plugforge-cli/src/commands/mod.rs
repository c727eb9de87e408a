pub mod check;
pub mod compile;
pub mod platforms;

use plugforge_config::ProjectConfig;
use plugforge_manifest::types::GeneratorOptions;

/// `[generator]` formats from the project config over the built-in defaults
pub(crate) fn generator_defaults(config: Option<&ProjectConfig>) -> GeneratorOptions {
    let mut options = GeneratorOptions::default();
    if let Some(generator) = config.map(|c| &c.generator) {
        if let Some(class_name) = &generator.class_name {
            options.class_name.clone_from(class_name);
        }
        if let Some(package_name) = &generator.package_name {
            options.package_name.clone_from(package_name);
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugforge_config::GeneratorConfig;

    #[test]
    fn test_generator_defaults_from_config() {
        let config = ProjectConfig {
            generator: GeneratorConfig {
                class_name: Some("{name}Entry".to_string()),
                package_name: None,
            },
            ..ProjectConfig::default()
        };
        let options = generator_defaults(Some(&config));
        assert_eq!(options.class_name, "{name}Entry");
        assert_eq!(options.package_name, GeneratorOptions::default().package_name);
        assert_eq!(generator_defaults(None), GeneratorOptions::default());
    }
}
