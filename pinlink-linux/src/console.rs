//! Line commands read from stdin.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Peers,
    Status,
    Pin { board: String, pin: u8, value: u8 },
    Read { board: String, pin: u8 },
    Say { board: String, message: String },
    Publish { topic: String, message: String },
    Serial { data: String },
    Help,
    Quit,
}

pub const HELP: &str = "\
peers                      list known boards
status                     link counters as JSON
pin <board> <pin> <value>  set a pin on a remote board
read <board> <pin>         read a pin on a remote board
say <board> <message>      direct message
publish <topic> <message>  broadcast on a topic
serial <data>              broadcast serial data
quit";

/// Parse one console line. `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = split_word(line);
    let cmd = match word {
        "peers" => Command::Peers,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "pin" => {
            let (board, rest) = required(rest, "board")?;
            let (pin, rest) = required(rest, "pin")?;
            let (value, _) = required(rest, "value")?;
            Command::Pin {
                board: board.to_string(),
                pin: number(pin, "pin")?,
                value: number(value, "value")?,
            }
        }
        "read" => {
            let (board, rest) = required(rest, "board")?;
            let (pin, _) = required(rest, "pin")?;
            Command::Read {
                board: board.to_string(),
                pin: number(pin, "pin")?,
            }
        }
        "say" => {
            let (board, message) = required(rest, "board")?;
            Command::Say {
                board: board.to_string(),
                message: text(message, "message")?,
            }
        }
        "publish" => {
            let (topic, message) = required(rest, "topic")?;
            Command::Publish {
                topic: topic.to_string(),
                message: text(message, "message")?,
            }
        }
        "serial" => Command::Serial {
            data: text(rest, "data")?,
        },
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Some(cmd))
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn required<'a>(s: &'a str, what: &str) -> Result<(&'a str, &'a str), String> {
    match split_word(s) {
        ("", _) => Err(format!("missing {what}")),
        pair => Ok(pair),
    }
}

fn number(s: &str, what: &str) -> Result<u8, String> {
    s.parse().map_err(|_| format!("{what} must be 0-255, got `{s}`"))
}

fn text(s: &str, what: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("missing {what}"));
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn pin_command() {
        assert_eq!(
            parse("pin garage 13 1"),
            Ok(Some(Command::Pin {
                board: "garage".into(),
                pin: 13,
                value: 1
            }))
        );
        assert!(parse("pin garage 13").is_err());
        assert!(parse("pin garage 300 1").is_err());
    }

    #[test]
    fn messages_keep_their_spaces() {
        assert_eq!(
            parse("say porch  hello   there "),
            Ok(Some(Command::Say {
                board: "porch".into(),
                message: "hello   there".into()
            }))
        );
        assert_eq!(
            parse("publish temp 21.5 C"),
            Ok(Some(Command::Publish {
                topic: "temp".into(),
                message: "21.5 C".into()
            }))
        );
    }

    #[test]
    fn missing_text_is_an_error() {
        assert!(parse("say porch").is_err());
        assert!(parse("serial").is_err());
    }

    #[test]
    fn unknown_command() {
        assert!(parse("reboot now").unwrap_err().contains("reboot"));
    }
}
