//! Console commands accepted by the controller
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Select(String),
    Clear,
    Play,
    Pause,
    Toggle,
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match word.to_ascii_lowercase().as_str() {
            "list" | "ls" => Ok(Command::List),
            "select" | "tune" if !rest.is_empty() => Ok(Command::Select(rest.to_string())),
            "select" | "tune" => Err("usage: select <channel>".to_string()),
            "clear" => Ok(Command::Clear),
            "play" => Ok(Command::Play),
            "pause" => Ok(Command::Pause),
            "" | "p" => Ok(Command::Toggle),
            "status" => Ok(Command::Status),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("list".parse::<Command>(), Ok(Command::List));
        assert_eq!("  PLAY ".parse::<Command>(), Ok(Command::Play));
        assert_eq!("".parse::<Command>(), Ok(Command::Toggle));
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_select_keeps_channel_name() {
        assert_eq!(
            "select Vocal Trance".parse::<Command>(),
            Ok(Command::Select("Vocal Trance".to_string()))
        );
        assert!("select".parse::<Command>().is_err());
        assert!("rewind".parse::<Command>().is_err());
    }
}
