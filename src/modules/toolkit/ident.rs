//! Identifier sanitizing for generated source

/// Words a generated identifier must never collide with
const RESERVED: &[&str] = &[
    "address", "bool", "string", "bytes", "uint", "int", "byte", "contract", "interface", "library",
    "function", "event", "error", "struct", "enum", "mapping", "memory", "storage", "calldata",
    "public", "private", "internal", "external", "pure", "view", "payable", "returns", "return",
    "if", "else", "for", "while", "do", "break", "continue", "new", "delete", "emit", "import",
    "pragma", "modifier", "constant", "immutable", "override", "virtual", "this", "super", "true",
    "false", "type", "using", "is", "try", "catch", "assembly", "fallback", "receive", "constructor",
    "vm", "console",
];

/// Reduce `raw` to `[A-Za-z0-9_]`, collapsing runs of underscores
///
/// Leading digits get an underscore prefix; empty input and reserved words
/// fall back to or are suffixed with `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('_');
    let mut ident = if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    };

    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// Capitalize the first character (`vault` -> `Vault`)
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_identifier("USDC.e"), "USDC_e");
        assert_eq!(sanitize_identifier("a--b  c"), "a_b_c");
        assert_eq!(sanitize_identifier("1INCH"), "_1INCH");
        assert_eq!(sanitize_identifier("$$$"), "_");
        assert_eq!(sanitize_identifier("address"), "address_");
        assert_eq!(sanitize_identifier("WETH"), "WETH");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("vault"), "Vault");
        assert_eq!(capitalize(""), "");
    }
}
