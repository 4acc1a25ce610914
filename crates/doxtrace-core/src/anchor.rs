//! Recognition of the code lines annotations attach to
//!
//! This is not a C++ parser. A code line is a test-case
//! definition when it starts with a known test macro invocation that is not
//! terminated by `;`, a forward declaration when it looks like a bodiless
//! function prototype, and anything else otherwise.

use facet::Facet;

/// How a test macro spells the name of the test it defines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum MacroShape {
    /// `BOOST_AUTO_TEST_CASE(name)`: the first argument
    Name,
    /// `TEST(Suite, Name)`: the first two arguments joined as `Suite.Name`
    SuiteAndName,
}

/// A macro (or keyword) that introduces a test-case definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
pub struct TestMacro {
    pub name: String,
    pub shape: MacroShape,
}

impl TestMacro {
    pub fn new(name: impl Into<String>, shape: MacroShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// Boost.Test macros, named by their first argument
pub const BOOST_TEST_MACROS: &[&str] = &[
    "BOOST_AUTO_TEST_CASE",
    "BOOST_AUTO_TEST_CASE_TEMPLATE",
    "BOOST_FIXTURE_TEST_CASE",
    "BOOST_DATA_TEST_CASE",
    "BOOST_PARAM_TEST_CASE",
];

/// GoogleTest macros, named `Suite.Name`
pub const GTEST_MACROS: &[&str] = &["TEST", "TEST_F", "TEST_P", "TYPED_TEST", "TYPED_TEST_P"];

/// The built-in macro table
pub fn default_test_macros() -> Vec<TestMacro> {
    BOOST_TEST_MACROS
        .iter()
        .map(|name| TestMacro::new(*name, MacroShape::Name))
        .chain(
            GTEST_MACROS
                .iter()
                .map(|name| TestMacro::new(*name, MacroShape::SuiteAndName)),
        )
        .collect()
}

/// What a code line is, as far as association cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// A test-case definition
    TestCase { name: String, macro_name: String },
    /// A bodiless prototype such as `void test1a();`
    ForwardDeclaration { name: String },
    /// Any other code
    Other,
}

/// Classify one code line (comments already removed)
pub fn classify(code: &str, macros: &[TestMacro]) -> Anchor {
    if let Some((name, macro_name)) = test_case(code, macros) {
        return Anchor::TestCase { name, macro_name };
    }
    if let Some(name) = forward_declaration(code) {
        return Anchor::ForwardDeclaration { name };
    }
    Anchor::Other
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_') && chars.all(is_ident_char)
}

/// Split a leading identifier off `s`
fn leading_identifier(s: &str) -> Option<(&str, &str)> {
    let end = s.find(|c: char| !is_ident_char(c)).unwrap_or(s.len());
    let ident = &s[..end];
    is_identifier(ident).then(|| (ident, &s[end..]))
}

fn test_case(code: &str, macros: &[TestMacro]) -> Option<(String, String)> {
    let code = code.trim();
    if code.ends_with(';') {
        return None;
    }
    let (ident, rest) = leading_identifier(code)?;
    let test_macro = macros.iter().find(|m| m.name == ident)?;
    let args = rest.trim_start().strip_prefix('(')?;
    let args = match args.find(')') {
        Some(close) => &args[..close],
        None => args,
    };
    let mut args = args.split(',').map(str::trim);

    let name = match test_macro.shape {
        MacroShape::Name => {
            let name = args.next().filter(|a| is_identifier(a))?;
            name.to_string()
        }
        MacroShape::SuiteAndName => {
            let suite = args.next().filter(|a| is_identifier(a))?;
            let name = args.next().filter(|a| is_identifier(a))?;
            format!("{}.{}", suite, name)
        }
    };
    Some((name, test_macro.name.clone()))
}

/// Words that start statements, never declarations
const STATEMENT_KEYWORDS: &[&str] = &[
    "return", "throw", "delete", "new", "goto", "case", "else", "do", "co_return", "co_await",
    "co_yield", "using", "typedef", "if", "while", "for", "switch",
];

/// Trailing qualifiers allowed after the parameter list
const TRAILING_QUALIFIERS: &[&str] = &["const", "noexcept", "override", "final", "volatile"];

fn forward_declaration(code: &str) -> Option<String> {
    let body = code.trim().strip_suffix(';')?.trim_end();
    if body.contains('{') {
        return None;
    }

    let open = body.find('(')?;
    let close = body.rfind(')')?;
    if close < open {
        return None;
    }
    let after = &body[close + 1..];
    if !after
        .split_whitespace()
        .all(|word| TRAILING_QUALIFIERS.contains(&word))
    {
        return None;
    }

    let head = &body[..open];
    if head.contains('=') {
        return None;
    }
    let words: Vec<&str> = head.split_whitespace().collect();
    if words.len() < 2 || STATEMENT_KEYWORDS.contains(&words[0]) {
        return None;
    }

    let last = words[words.len() - 1].trim_start_matches(['*', '&']);
    let name = last.rsplit("::").next().unwrap_or(last);
    is_identifier(name).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_default(code: &str) -> Anchor {
        classify(code, &default_test_macros())
    }

    fn test_case_named(name: &str, macro_name: &str) -> Anchor {
        Anchor::TestCase {
            name: name.to_string(),
            macro_name: macro_name.to_string(),
        }
    }

    #[test]
    fn test_boost_test_case() {
        assert_eq!(
            classify_default("BOOST_AUTO_TEST_CASE(test1a)"),
            test_case_named("test1a", "BOOST_AUTO_TEST_CASE")
        );
        assert_eq!(
            classify_default("BOOST_AUTO_TEST_CASE( test4a ) { int i = 5; }"),
            test_case_named("test4a", "BOOST_AUTO_TEST_CASE")
        );
        assert_eq!(
            classify_default("BOOST_FIXTURE_TEST_CASE(with_fixture, Fixture)"),
            test_case_named("with_fixture", "BOOST_FIXTURE_TEST_CASE")
        );
    }

    #[test]
    fn test_gtest_case() {
        assert_eq!(
            classify_default("TEST_F(Parser, HandlesEmptyInput) {"),
            test_case_named("Parser.HandlesEmptyInput", "TEST_F")
        );
    }

    #[test]
    fn test_macro_statement_is_not_a_definition() {
        assert_eq!(classify_default("BOOST_AUTO_TEST_CASE(test1a);"), Anchor::Other);
        assert_eq!(classify_default("BOOST_CHECK(i > 4);"), Anchor::Other);
        assert_eq!(classify_default("BOOST_AUTO_TEST_CASE_X(test1a)"), Anchor::Other);
    }

    #[test]
    fn test_unknown_macro_needs_configuration() {
        let macros = vec![TestMacro::new("MY_TEST", MacroShape::Name)];
        assert_eq!(
            classify("MY_TEST(custom) {", &macros),
            test_case_named("custom", "MY_TEST")
        );
        assert_eq!(
            classify("BOOST_AUTO_TEST_CASE(test1a)", &macros),
            Anchor::Other
        );
    }

    #[test]
    fn test_forward_declarations() {
        let decl = |name: &str| Anchor::ForwardDeclaration {
            name: name.to_string(),
        };
        assert_eq!(classify_default("void test1a();"), decl("test1a"));
        assert_eq!(classify_default("static void test3b(void) ;"), decl("test3b"));
        assert_eq!(classify_default("int *make(int a, int b);"), decl("make"));
        assert_eq!(classify_default("void suite::check() const;"), decl("check"));
    }

    #[test]
    fn test_statements_are_not_declarations() {
        for code in [
            "int i = 1;",
            "int x = compute();",
            "return helper();",
            "helper(1, 2);",
            "void inline_body() { run(); }",
            "#include <boost/test/included/unit_test.hpp>",
            "{",
        ] {
            assert_eq!(classify_default(code), Anchor::Other, "code {:?}", code);
        }
    }
}
