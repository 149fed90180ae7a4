//! Line commands for the interactive mode
//!
//! Each stdin line is one command, e.g. `type email`, `set subject Hello`,
//! `dots classy-rounded`, `download transparent`.

use crate::content::DataType;
use crate::engine::StylingEngine;
use crate::error::{Error, Result};
use crate::output::{self, Rendered};
use crate::session::{Field, Session};
use crate::style::{
    Background, CornerDotStyle, CornerSquareStyle, DotStyle, ErrorCorrection, HexColor,
};
use serde_json::json;
use std::path::PathBuf;
use std::str::FromStr;

/// Help text printed by `help`
pub const HELP: &str = "\
Commands:
  type <url|text|email|phone>     switch content type (clears fields)
  set <field> <value>             value | to | subject | body | number
  fg <#hex>                       foreground colour
  bg <#hex|transparent>           background
  dots <style>                    square | dots | rounded | extra-rounded | classy | classy-rounded
  corner-square <style>           square | dot | extra-rounded
  corner-dot <style>              square | dot
  ec <L|M|Q|H>                    error correction level
  size <px>                       download size (200-2000, step 50)
  logo <path>                     load a logo image
  logo-size <fraction|percent>    logo size (0.10-0.60 or 10-60)
  remove-logo                     drop the logo
  download [transparent]          save a PNG
  details                         show the details panel
  status                          show the preview state
  help                            this text
  quit                            exit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// `type <data-type>`
    Type(DataType),
    /// `set <field> <value>`
    Set(Field, String),
    /// `fg <color>`
    Foreground(HexColor),
    /// `bg <color|transparent>`
    Background(Background),
    /// `dots <style>`
    Dots(DotStyle),
    /// `corner-square <style>`
    CornerSquare(CornerSquareStyle),
    /// `corner-dot <style>`
    CornerDot(CornerDotStyle),
    /// `ec <level>`
    ErrorCorrection(ErrorCorrection),
    /// `size <px>`
    Size(u32),
    /// `logo <path>`
    Logo(PathBuf),
    /// `logo-size <value>`
    LogoSize(f32),
    /// `remove-logo`
    RemoveLogo,
    /// `download [transparent]`
    Download {
        /// Force a transparent background
        transparent: bool,
    },
    /// `details`
    Details,
    /// `status`
    Status,
    /// `help`
    Help,
    /// `quit` / `exit`
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let required = |what: &'static str| required_arg(verb, rest, what);

        Ok(match verb.to_ascii_lowercase().as_str() {
            "type" => Self::Type(required("a data type")?.parse()?),
            "set" => {
                let args = required("a field and a value")?;
                // The value may be empty (clearing a field) or contain spaces.
                let (field, value) = match args.split_once(char::is_whitespace) {
                    Some((field, value)) => (field, value.trim_start()),
                    None => (args, ""),
                };
                Self::Set(field.parse()?, value.to_string())
            }
            "fg" | "foreground" => {
                Self::Foreground(required("a colour")?.parse().map_err(|e: Error| e.to_string())?)
            }
            "bg" | "background" => {
                Self::Background(required("a colour")?.parse().map_err(|e: Error| e.to_string())?)
            }
            "dots" => Self::Dots(required("a dot style")?.parse()?),
            "corner-square" => Self::CornerSquare(required("a corner square style")?.parse()?),
            "corner-dot" => Self::CornerDot(required("a corner dot style")?.parse()?),
            "ec" => Self::ErrorCorrection(required("a level")?.parse()?),
            "size" => Self::Size(
                required("a pixel size")?
                    .parse()
                    .map_err(|e| format!("Invalid size '{rest}': {e}"))?,
            ),
            "logo" => Self::Logo(PathBuf::from(required("a file path")?)),
            "logo-size" => Self::LogoSize(parse_fraction(required("a size")?)?),
            "remove-logo" => Self::RemoveLogo,
            "download" => match rest {
                "" | "opaque" => Self::Download { transparent: false },
                "transparent" => Self::Download { transparent: true },
                other => return Err(format!("Unknown download variant '{other}'")),
            },
            "details" => Self::Details,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("Unknown command '{other}', try 'help'")),
        })
    }
}

fn required_arg<'a>(verb: &str, rest: &'a str, what: &str) -> std::result::Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("'{verb}' needs {what}"))
    } else {
        Ok(rest)
    }
}

/// Accepts `0.3`, `30` or `30%`.
fn parse_fraction(raw: &str) -> std::result::Result<f32, String> {
    let (number, percent) = match raw.strip_suffix('%') {
        Some(number) => (number, true),
        None => (raw, false),
    };
    let value: f32 = number
        .parse()
        .map_err(|e| format!("Invalid logo size '{raw}': {e}"))?;
    Ok(if percent || value > 1.0 { value / 100.0 } else { value })
}

/// Apply `command` to `session`, returning what to print.
///
/// `Quit` is the caller's business and yields `None`.
pub async fn execute<E: StylingEngine>(
    session: &mut Session<E>,
    command: ConsoleCommand,
) -> Result<Option<Rendered>> {
    let ack = |message: String| {
        Some(Rendered {
            json: json!({ "ok": message }),
            human: vec![message],
        })
    };

    Ok(match command {
        ConsoleCommand::Type(data_type) => {
            session.set_data_type(data_type)?;
            ack(format!("Type: {data_type}"))
        }
        ConsoleCommand::Set(field, value) => {
            session.set_field(field, value)?;
            ack(format!("Payload: {}", session.payload()))
        }
        ConsoleCommand::Foreground(color) => {
            session.set_foreground(color)?;
            ack(format!("Foreground: {color}"))
        }
        ConsoleCommand::Background(background) => {
            session.set_background(background)?;
            ack(format!("Background: {background}"))
        }
        ConsoleCommand::Dots(style) => {
            session.set_dot_style(style)?;
            ack(format!("Dot style: {style}"))
        }
        ConsoleCommand::CornerSquare(style) => {
            session.set_corner_square_style(style)?;
            ack(format!("Corner square style: {style}"))
        }
        ConsoleCommand::CornerDot(style) => {
            session.set_corner_dot_style(style)?;
            ack(format!("Corner dot style: {style}"))
        }
        ConsoleCommand::ErrorCorrection(level) => {
            session.set_error_correction(level)?;
            ack(format!("Error correction: {level}"))
        }
        ConsoleCommand::Size(size) => {
            let applied = session.set_download_size(size)?;
            ack(format!("Download size: {0}x{0}px", applied.get()))
        }
        ConsoleCommand::Logo(path) => {
            session.load_logo(path);
            match session.finish_logo().await? {
                Some(_) => ack("Logo applied".to_string()),
                None => ack("Logo superseded".to_string()),
            }
        }
        ConsoleCommand::LogoSize(size) => {
            let applied = session.set_logo_size(size)?;
            ack(format!("Logo size: {}%", applied.percent()))
        }
        ConsoleCommand::RemoveLogo => {
            session.remove_logo()?;
            ack("Logo removed".to_string())
        }
        ConsoleCommand::Download { transparent } => {
            session.settled().await;
            let saved = session.download(transparent).await?;
            Some(output::render_download(saved.as_ref()))
        }
        ConsoleCommand::Details => Some(output::render_details(session.details().as_ref())),
        ConsoleCommand::Status => {
            let state = session.settled().await;
            Some(output::render_state(&state))
        }
        ConsoleCommand::Help => Some(Rendered {
            json: json!({ "help": HELP }),
            human: HELP.lines().map(str::to_string).collect(),
        }),
        ConsoleCommand::Quit => None,
    })
}
