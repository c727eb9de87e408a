//! Naming utilities for generated Java types
//!
//! Platform keys are kebab-case (`bungeecord`, `my-host`), generated classes
//! are PascalCase and packages are dotted lowercase paths.

/// Convert a kebab-case platform key to a PascalCase display name
///
/// - bukkit -> Bukkit
/// - my-host -> MyHost
pub fn kebab_to_pascal(key: &str) -> String {
    key.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Split a fully-qualified class name into `(package, simple name)`
pub fn split_qualified(qualified: &str) -> (&str, &str) {
    match qualified.rfind('.') {
        Some(pos) => (&qualified[..pos], &qualified[pos + 1..]),
        None => ("", qualified),
    }
}

/// Join a package and a simple name, skipping the dot for the default package
pub fn qualify(package: &str, simple: &str) -> String {
    if package.is_empty() {
        simple.to_string()
    } else {
        format!("{package}.{simple}")
    }
}

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "null", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "void", "volatile", "while",
];

/// Whether `name` can be used as a Java identifier
pub fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !JAVA_KEYWORDS.contains(&name)
}

/// Whether `package` is a dotted sequence of Java identifiers
pub fn is_java_package(package: &str) -> bool {
    !package.is_empty() && package.split('.').all(is_java_identifier)
}

/// Directory path for a package (`com.example.platform` -> `com/example/platform`)
pub fn package_path(package: &str) -> String {
    package.replace('.', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_to_pascal() {
        assert_eq!(kebab_to_pascal("bukkit"), "Bukkit");
        assert_eq!(kebab_to_pascal("my-host"), "MyHost");
        assert_eq!(kebab_to_pascal("bungeecord"), "Bungeecord");
    }

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("com.example.Demo"), ("com.example", "Demo"));
        assert_eq!(split_qualified("Demo"), ("", "Demo"));
    }

    #[test]
    fn test_java_identifiers() {
        assert!(is_java_identifier("DemoBukkit"));
        assert!(is_java_identifier("_x$1"));
        assert!(!is_java_identifier("1Demo"));
        assert!(!is_java_identifier("class"));
        assert!(!is_java_identifier("my-plugin"));
        assert!(is_java_package("com.example.platform.bukkit"));
        assert!(!is_java_package("com..example"));
    }
}
