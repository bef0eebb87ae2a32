//! dhcpd.conf tokenizer and tree builder
//!
//! The grammar handled here is the structural subset of dhcpd.conf: `#`
//! comments, `statement;`, `header { ... }` blocks (nested to any depth) and
//! double-quoted strings, inside which `;`, `{`, `}` and `#` are literal.

use crate::error::DhcpConfigError;

/// A node of the parsed configuration tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Comment(String),
    Statement(String),
    Block { header: String, children: Vec<Node> },
}

#[derive(Debug)]
enum Token {
    Comment(String),
    Statement(String),
    Open { header: String, line: usize },
    Close { line: usize },
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(input: &str) -> Result<Vec<Token>, DhcpConfigError> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut line = 1;
    let mut buf_line = 1;
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        if in_quotes {
            buf.push(c);
            if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                buf.push(c);
            }
            '#' => {
                let mut comment = String::new();
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    comment.push(next);
                    chars.next();
                }
                tokens.push(Token::Comment(comment.trim().to_string()));
            }
            ';' => {
                let text = normalize(&buf);
                if !text.is_empty() {
                    tokens.push(Token::Statement(text));
                }
                buf.clear();
            }
            '{' => {
                let header = normalize(&buf);
                if header.is_empty() {
                    return Err(DhcpConfigError::Parse {
                        line,
                        message: "block without a header".to_string(),
                    });
                }
                tokens.push(Token::Open { header, line });
                buf.clear();
            }
            '}' => {
                let text = normalize(&buf);
                if !text.is_empty() {
                    return Err(DhcpConfigError::Parse {
                        line: buf_line,
                        message: format!("missing ';' after `{}`", text),
                    });
                }
                tokens.push(Token::Close { line });
                buf.clear();
            }
            _ => {
                if buf.trim().is_empty() && !c.is_whitespace() {
                    buf_line = line;
                }
                buf.push(c);
            }
        }
    }

    if in_quotes {
        return Err(DhcpConfigError::Parse {
            line: buf_line,
            message: "unterminated string".to_string(),
        });
    }
    let rest = normalize(&buf);
    if !rest.is_empty() {
        return Err(DhcpConfigError::Parse {
            line: buf_line,
            message: format!("missing ';' after `{}`", rest),
        });
    }
    Ok(tokens)
}

/// Parse `input` into a tree of top-level nodes.
pub(crate) fn parse(input: &str) -> Result<Vec<Node>, DhcpConfigError> {
    // Each open block: (header, opening line, children so far)
    let mut stack: Vec<(String, usize, Vec<Node>)> = Vec::new();
    let mut top = Vec::new();

    for token in tokenize(input)? {
        let node = match token {
            Token::Comment(text) => Node::Comment(text),
            Token::Statement(text) => Node::Statement(text),
            Token::Open { header, line } => {
                stack.push((header, line, Vec::new()));
                continue;
            }
            Token::Close { line } => {
                let Some((header, _, children)) = stack.pop() else {
                    return Err(DhcpConfigError::Parse {
                        line,
                        message: "unmatched '}'".to_string(),
                    });
                };
                Node::Block { header, children }
            }
        };
        match stack.last_mut() {
            Some((_, _, children)) => children.push(node),
            None => top.push(node),
        }
    }

    if let Some((header, line, _)) = stack.pop() {
        return Err(DhcpConfigError::Parse {
            line,
            message: format!("block `{}` is never closed", header),
        });
    }
    Ok(top)
}

/// Render nodes back to lines, indenting nested blocks by two spaces.
pub(crate) fn render_nodes(nodes: &[Node]) -> Vec<String> {
    let mut lines = Vec::new();
    for node in nodes {
        match node {
            Node::Comment(text) => lines.push(format!("# {}", text)),
            Node::Statement(text) => lines.push(format!("{};", text)),
            Node::Block { header, children } => {
                lines.push(format!("{} {{", header));
                lines.extend(render_nodes(children).into_iter().map(|l| format!("  {}", l)));
                lines.push("}".to_string());
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_blocks_and_comments() {
        let input = "\
# leading comment
option domain-name \"lab; local\";
shared-network lab {
  subnet 10.0.0.0 netmask 255.255.255.0 {
    range 10.0.0.10 10.0.0.20;
  }
}
";
        let nodes = parse(input).unwrap();

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Comment("leading comment".to_string()));
        assert_eq!(
            nodes[1],
            Node::Statement("option domain-name \"lab; local\"".to_string())
        );
        match &nodes[2] {
            Node::Block { header, children } => {
                assert_eq!(header, "shared-network lab");
                assert_eq!(children.len(), 1);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_reports_missing_semicolon() {
        let err = parse("host a {\n  fixed-address 10.0.0.1\n}\n").unwrap_err();
        match err {
            DhcpConfigError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("fixed-address 10.0.0.1"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_reports_unclosed_block() {
        let err = parse("subnet 10.0.0.0 netmask 255.255.255.0 {\n").unwrap_err();
        assert!(matches!(err, DhcpConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_reports_stray_close() {
        assert!(matches!(
            parse("}\n"),
            Err(DhcpConfigError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_render_indents_nested_blocks() {
        let nodes = parse("group { host a { fixed-address 10.0.0.1; } }").unwrap();
        assert_eq!(
            render_nodes(&nodes),
            vec![
                "group {".to_string(),
                "  host a {".to_string(),
                "    fixed-address 10.0.0.1;".to_string(),
                "  }".to_string(),
                "}".to_string(),
            ]
        );
    }
}
