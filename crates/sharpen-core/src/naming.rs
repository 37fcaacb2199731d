//! Shared naming utilities: identifier validation, C# keywords and case
//! conversion.
//!
//! Namespace segments and class names are never re-cased. Directory names
//! and file stems are carried into C# verbatim so that the name a user sees
//! in their tree is the name they get in the output. The case helpers here
//! are only used for synthesized names (record types, runtime members).

/// Reserved C# keywords. Contextual keywords (`var`, `async`, `record`, ...)
/// are legal identifiers and deliberately absent.
pub const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Check whether `name` is a reserved C# keyword
pub fn is_csharp_keyword(name: &str) -> bool {
    CSHARP_KEYWORDS.binary_search(&name).is_ok()
}

/// A character allowed inside a namespace segment or class name
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Check that `segment` is a usable C# identifier: non-empty, only
/// `[A-Za-z0-9_]`, not starting with a digit, not a keyword
pub fn is_identifier_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.chars().all(is_identifier_char)
        && !segment.starts_with(|c: char| c.is_ascii_digit())
        && !is_csharp_keyword(segment)
}

/// Escape an identifier that collides with a C# keyword using the `@` prefix
///
/// # Examples
/// ```
/// use sharpen_core::naming::escape_identifier;
/// assert_eq!(escape_identifier("value"), "value");
/// assert_eq!(escape_identifier("params"), "@params");
/// assert_eq!(escape_identifier("object"), "@object");
/// ```
pub fn escape_identifier(name: &str) -> String {
    if is_csharp_keyword(name) {
        format!("@{}", name)
    } else {
        name.to_string()
    }
}

/// Simple PascalCase conversion: capitalize the first letter, keep the rest
///
/// # Examples
/// ```
/// use sharpen_core::naming::to_pascal_case;
/// assert_eq!(to_pascal_case("floor"), "Floor");
/// assert_eq!(to_pascal_case("appConfig"), "AppConfig");
/// assert_eq!(to_pascal_case("HTTPProxy"), "HTTPProxy");
/// ```
pub fn to_pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_is_sorted() {
        let mut sorted = CSHARP_KEYWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, CSHARP_KEYWORDS);
    }

    #[test]
    fn test_is_csharp_keyword() {
        assert!(is_csharp_keyword("class"));
        assert!(is_csharp_keyword("namespace"));
        assert!(is_csharp_keyword("while"));
        assert!(!is_csharp_keyword("var"));
        assert!(!is_csharp_keyword("record"));
        assert!(!is_csharp_keyword("Class"));
    }

    #[test]
    fn test_is_identifier_segment() {
        assert!(is_identifier_segment("models"));
        assert!(is_identifier_segment("_private"));
        assert!(is_identifier_segment("v2"));
        assert!(!is_identifier_segment(""));
        assert!(!is_identifier_segment("2fa"));
        assert!(!is_identifier_segment("my-dir"));
        assert!(!is_identifier_segment("class"));
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case(""), "");
        assert_eq!(to_pascal_case("log"), "Log");
    }
}
