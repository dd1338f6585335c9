use crate::registry::{CommandDescriptor, RawOption};
use ocean_cli_shared::{CliError, CliResult};

/// Split a prompt line into words.
///
/// Single quotes keep their content verbatim, double quotes allow `\"` and
/// `\\`. A backslash outside quotes is literal so `\q` survives.
pub fn tokenize(line: &str) -> CliResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(CliError::InvalidArgument(
                                "unterminated single quote".to_string(),
                            ))
                        }
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(CliError::InvalidArgument(
                                "unterminated double quote".to_string(),
                            ))
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Separate positional arguments from `--name value` / `-x value` options.
///
/// Options naming a parameter consume the next word; flags only consume it
/// when it is a boolean literal. Everything after `--` is positional.
pub fn split_arguments(
    descriptor: &CommandDescriptor,
    words: &[String],
) -> CliResult<(Vec<String>, Vec<RawOption>)> {
    let mut positionals = Vec::new();
    let mut options = Vec::new();
    let mut iter = words.iter().peekable();

    while let Some(word) = iter.next() {
        if word == "--" {
            positionals.extend(iter.by_ref().cloned());
            break;
        }

        let Some(stripped) = option_name(word) else {
            positionals.push(word.clone());
            continue;
        };

        if let Some((name, value)) = stripped.split_once('=') {
            options.push(RawOption::new(name, Some(value)));
            continue;
        }

        match descriptor.takes_value(stripped) {
            Some(true) => {
                let value = iter.next().ok_or_else(|| {
                    CliError::InvalidArgument(format!("option {} needs a value", word))
                })?;
                options.push(RawOption::new(stripped, Some(value)));
            }
            Some(false) => {
                let value = iter.next_if(|next| is_bool_literal(next));
                options.push(RawOption::new(stripped, value.map(String::as_str)));
            }
            None => {
                return Err(CliError::InvalidArgument(format!(
                    "unknown option '{}' for {}",
                    word, descriptor.name
                )))
            }
        }
    }

    Ok((positionals, options))
}

fn option_name(word: &str) -> Option<&str> {
    if let Some(long) = word.strip_prefix("--") {
        return (!long.is_empty()).then_some(long);
    }
    let short = word.strip_prefix('-')?;
    let mut chars = short.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(short),
        _ => None,
    }
}

fn is_bool_literal(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "true" | "false" | "1" | "0" | "yes" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Handler, ParamSpec};

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_quotes() {
        let line = r#"startFreeCompute '["did:op:aaa", "did:op:ccc"]' did:op:bbb  env-1"#;
        let tokens = tokenize(line).unwrap();
        assert_eq!(
            tokens,
            words(&["startFreeCompute", r#"["did:op:aaa", "did:op:ccc"]"#, "did:op:bbb", "env-1"])
        );

        let tokens = tokenize(r#"publish "my file.json" "say \"hi\"""#).unwrap();
        assert_eq!(tokens, words(&["publish", "my file.json", r#"say "hi""#]));
    }

    #[test]
    fn test_tokenize_keeps_backslash_q() {
        assert_eq!(tokenize("  \\q ").unwrap(), words(&["\\q"]));
        assert!(tokenize("").unwrap().is_empty());
        assert_eq!(tokenize("x ''").unwrap(), words(&["x", ""]));
    }

    #[test]
    fn test_tokenize_unterminated() {
        assert!(tokenize("getDDO 'did:op").is_err());
        assert!(tokenize("getDDO \"did:op").is_err());
    }

    #[test]
    fn test_split_arguments() {
        let descriptor = crate::registry::CommandDescriptor::new(
            "startCompute",
            Handler::StartCompute,
            "paid compute",
        )
        .param(ParamSpec::required("algoDid", "").short('a'))
        .param(ParamSpec::required("maxJobDuration", ""))
        .flag("accept", None, "");

        let (args, opts) = split_arguments(
            &descriptor,
            &words(&["did:op:x", "-a", "did:op:algo", "--accept", "true", "--maxJobDuration=60"]),
        )
        .unwrap();
        assert_eq!(args, words(&["did:op:x"]));
        assert_eq!(
            opts,
            vec![
                RawOption::new("a", Some("did:op:algo")),
                RawOption::new("accept", Some("true")),
                RawOption::new("maxJobDuration", Some("60")),
            ]
        );

        // A flag does not swallow a following positional
        let (args, opts) =
            split_arguments(&descriptor, &words(&["--accept", "did:op:y"])).unwrap();
        assert_eq!(args, words(&["did:op:y"]));
        assert_eq!(opts, vec![RawOption::new("accept", None)]);

        // Negative numbers and `--` stay positional
        let (args, _) = split_arguments(&descriptor, &words(&["-5", "--", "--accept"])).unwrap();
        assert_eq!(args, words(&["-5", "--accept"]));

        assert!(split_arguments(&descriptor, &words(&["--bogus", "1"])).is_err());
        assert!(split_arguments(&descriptor, &words(&["--algoDid"])).is_err());
    }
}
