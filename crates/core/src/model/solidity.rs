//! Lexical Solidity scanning.
//!
//! This is not a compiler front end. It understands just enough of the
//! grammar (comments, string literals, brace/paren nesting, contract bodies)
//! to recover state variable declarations and function names from verified
//! explorer sources, which are always syntactically valid.

use std::collections::BTreeMap;

use crate::model::{FunctionFacts, ParseOutcome, SourceFacts, VariableFacts};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Strings {
    /// Keep string literals verbatim.
    Keep,
    /// Replace string literal contents with nothing (`"..."` becomes `""`).
    Blank,
}

/// Output of the comment/string lexer plus the first structural problem seen.
struct Cleaned {
    text: String,
    problem: Option<String>,
}

fn clean(text: &str, strings: Strings) -> Cleaned {
    let mut out = String::with_capacity(text.len());
    let mut problem = None;
    let mut chars = text.chars().peekable();
    let mut line = 1usize;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let start = line;
                let mut closed = false;
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        line += 1;
                    }
                    if prev == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
                if !closed && problem.is_none() {
                    problem = Some(format!("unterminated block comment starting at line {start}"));
                }
            }
            '"' | '\'' => {
                let quote = c;
                let start = line;
                let mut literal = String::new();
                let mut closed = false;
                while let Some(next) = chars.next() {
                    if next == '\\' {
                        literal.push(next);
                        if let Some(escaped) = chars.next() {
                            literal.push(escaped);
                        }
                        continue;
                    }
                    if next == quote {
                        closed = true;
                        break;
                    }
                    if next == '\n' {
                        literal.push(next);
                        line += 1;
                        break;
                    }
                    literal.push(next);
                }
                out.push(quote);
                if strings == Strings::Keep {
                    out.push_str(&literal);
                }
                if closed {
                    out.push(quote);
                } else if problem.is_none() {
                    problem = Some(format!("unterminated string literal at line {start}"));
                }
            }
            '\n' => {
                line += 1;
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    Cleaned { text: out, problem }
}

/// Remove `//` and `/* */` comments, leaving string literals untouched.
///
/// Line breaks inside block comments are kept so line numbers stay stable.
pub fn strip_comments(text: &str) -> String {
    clean(text, Strings::Keep).text
}

enum Scope {
    Contract(String),
    Block,
}

const CONTAINER_KEYWORDS: [&str; 3] = ["contract", "library", "interface"];

const NON_VARIABLE_KEYWORDS: [&str; 13] = [
    "using",
    "event",
    "error",
    "function",
    "modifier",
    "constructor",
    "fallback",
    "receive",
    "type",
    "struct",
    "enum",
    "pragma",
    "import",
];

const VARIABLE_MODIFIERS: [&str; 8] =
    ["public", "private", "internal", "external", "constant", "immutable", "transient", "override"];

const FUNCTION_TYPE_MODIFIERS: [&str; 5] = ["internal", "external", "pure", "view", "payable"];

const VISIBILITIES: [&str; 4] = ["public", "external", "internal", "private"];

/// Scan a Solidity file and collect its state variables and functions.
///
/// Never panics and never returns partial facts: any structural problem
/// (unbalanced braces or parens, unterminated comment or string) yields
/// [`ParseOutcome::Failed`].
pub fn parse_source(text: &str) -> ParseOutcome {
    let cleaned = clean(text, Strings::Blank);
    if let Some(reason) = cleaned.problem {
        return ParseOutcome::Failed { reason };
    }

    let mut facts = SourceFacts::default();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut statement = String::new();
    let mut parens: i64 = 0;
    let mut line = 1usize;

    for c in cleaned.text.chars() {
        match c {
            '\n' => {
                line += 1;
                statement.push(' ');
            }
            '(' => {
                parens += 1;
                statement.push(c);
            }
            ')' => {
                parens -= 1;
                if parens < 0 {
                    return ParseOutcome::Failed {
                        reason: format!("unbalanced ')' at line {line}"),
                    };
                }
                statement.push(c);
            }
            '{' if parens > 0 => statement.push(c),
            '}' if parens > 0 => statement.push(c),
            '{' => {
                let header = std::mem::take(&mut statement);
                let contract = current_contract(&scopes).map(str::to_string);
                match scopes.last() {
                    None => match container_name(&header) {
                        Some(name) => scopes.push(Scope::Contract(name)),
                        None => {
                            record_function(&header, None, &mut facts.functions);
                            scopes.push(Scope::Block);
                        }
                    },
                    Some(Scope::Contract(_)) => {
                        record_function(&header, contract.as_deref(), &mut facts.functions);
                        scopes.push(Scope::Block);
                    }
                    Some(Scope::Block) => scopes.push(Scope::Block),
                }
            }
            '}' => {
                if scopes.pop().is_none() {
                    return ParseOutcome::Failed {
                        reason: format!("unbalanced '}}' at line {line}"),
                    };
                }
                statement.clear();
            }
            ';' if parens == 0 => {
                let body = std::mem::take(&mut statement);
                match scopes.last() {
                    Some(Scope::Contract(name)) => {
                        classify_member(&body, name, &mut facts);
                    }
                    None => {
                        record_function(&body, None, &mut facts.functions);
                    }
                    Some(Scope::Block) => {}
                }
            }
            _ => statement.push(c),
        }
    }

    if !scopes.is_empty() {
        return ParseOutcome::Failed {
            reason: format!("{} unclosed '{{' at end of file", scopes.len()),
        };
    }
    if parens != 0 {
        return ParseOutcome::Failed { reason: "unclosed '(' at end of file".to_string() };
    }

    ParseOutcome::Parsed(facts)
}

fn current_contract(scopes: &[Scope]) -> Option<&str> {
    scopes.iter().rev().find_map(|s| match s {
        Scope::Contract(name) => Some(name.as_str()),
        Scope::Block => None,
    })
}

fn container_name(header: &str) -> Option<String> {
    let words: Vec<&str> = header.split_whitespace().collect();
    let pos = words.iter().position(|w| CONTAINER_KEYWORDS.contains(w))?;
    let name = words.get(pos + 1)?;
    let name: String = name.chars().take_while(|c| is_ident_char(*c)).collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn record_function(
    header: &str,
    contract: Option<&str>,
    functions: &mut BTreeMap<String, FunctionFacts>,
) {
    let trimmed = header.trim_start();
    let Some(rest) = trimmed.strip_prefix("function") else {
        return;
    };
    if !rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
        return;
    }
    let name: String = rest.trim_start().chars().take_while(|c| is_ident_char(*c)).collect();
    if name.is_empty() {
        return;
    }
    let tokens = split_tokens(rest);
    let visibility = tokens.iter().find(|t| VISIBILITIES.contains(&t.as_str())).cloned();
    functions.entry(name.clone()).or_insert(FunctionFacts {
        name,
        visibility,
        contract: contract.map(str::to_string),
    });
}

fn classify_member(statement: &str, contract: &str, facts: &mut SourceFacts) {
    let trimmed = statement.trim();
    let Some(first) = trimmed.split(|c: char| c.is_whitespace() || c == '(').next() else {
        return;
    };
    let function_typed = first == "function" && is_function_type(trimmed);
    if first == "function" && !function_typed {
        record_function(trimmed, Some(contract), &mut facts.functions);
        return;
    }
    if first.is_empty() || (!function_typed && NON_VARIABLE_KEYWORDS.contains(&first)) {
        return;
    }

    let declaration = match initializer_start(trimmed) {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    let tokens = split_tokens(declaration);
    if tokens.len() < 2 {
        return;
    }

    let Some(name) = tokens[1..]
        .iter()
        .rev()
        .find(|t| !VARIABLE_MODIFIERS.contains(&t.as_str()) && !t.starts_with("override("))
    else {
        return;
    };
    if !name.chars().all(is_ident_char) || name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return;
    }

    let declared_type = if function_typed { function_type_name(&tokens) } else { tokens[0].clone() };
    facts.state_variables.entry(name.clone()).or_insert(VariableFacts {
        name: name.clone(),
        declared_type,
        is_constant: tokens.iter().any(|t| t == "constant"),
        is_immutable: tokens.iter().any(|t| t == "immutable"),
        contract: Some(contract.to_string()),
    });
}

/// `function (...)` with no name before the parameter list is a function
/// type, so a `;`-terminated member starting with it declares a variable.
fn is_function_type(statement: &str) -> bool {
    statement
        .strip_prefix("function")
        .is_some_and(|rest| rest.trim_start().starts_with('('))
}

/// The function type of a function-typed variable: the parameter list, its
/// own visibility and mutability, and the `returns` clause when present.
fn function_type_name(tokens: &[String]) -> String {
    if let Some(idx) = tokens.iter().position(|t| t.starts_with("returns(")) {
        return tokens[..=idx].join(" ");
    }
    let mut parts = vec![tokens[0].as_str()];
    parts.extend(
        tokens[1..]
            .iter()
            .map(String::as_str)
            .take_while(|t| FUNCTION_TYPE_MODIFIERS.contains(t))
            .take(2),
    );
    parts.join(" ")
}

/// Byte offset of the assignment `=` in a declaration, skipping `==`, `=>`,
/// comparison operators and anything nested in parens or brackets.
fn initializer_start(statement: &str) -> Option<usize> {
    let bytes = statement.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next == b'=' || next == b'>' || matches!(prev, b'=' | b'!' | b'<' | b'>') {
                    continue;
                }
                return Some(i);
            }
            _ => {}
        }
    }
    None
}

/// Whitespace split that keeps parenthesised and bracketed groups attached to
/// the preceding word (`mapping (a => b)` becomes one token).
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for c in text.chars() {
        match c {
            '(' | '[' => {
                if depth == 0 && current.is_empty() {
                    if let Some(last) = tokens.pop() {
                        current = last;
                    }
                }
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
