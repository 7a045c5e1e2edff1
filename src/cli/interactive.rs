//! Line-oriented session: the feed downloads in the background while the prompt stays
//! responsive, and every request is served from whatever table is published at the time.

use super::{rates, ui};
use crate::core::{RateBoard, RateError, RateFeed, Refresh};
use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::debug;

const HELP: &str = "Commands:
  <amount> <from> <to>   convert, e.g. `100 USD EUR`
  list                   show available currencies
  refresh                download the rates again
  help                   show this message
  quit                   leave";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Convert {
        amount: String,
        from: String,
        to: String,
    },
    List,
    Refresh,
    Help,
    Quit,
    Unrecognized(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return None,
        [word] => match word.to_ascii_lowercase().as_str() {
            "list" | "ls" => Command::List,
            "refresh" => Command::Refresh,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Unrecognized(line.trim().to_string()),
        },
        // An amount-less request still reaches the engine so it reports the empty amount.
        [from, to] => Command::Convert {
            amount: String::new(),
            from: from.to_string(),
            to: to.to_string(),
        },
        [amount, from, to] => Command::Convert {
            amount: amount.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        },
        _ => Command::Unrecognized(line.trim().to_string()),
    };
    Some(command)
}

fn describe_refresh(outcome: Result<Refresh, RateError>) -> String {
    match outcome {
        Ok(Refresh::Published { currencies, date }) => {
            let on = date
                .map(|d| format!(" on {}", d.format("%d.%m.%Y")))
                .unwrap_or_default();
            ui::style_text(
                &format!("Loaded {currencies} currencies{on}"),
                ui::StyleType::Subtle,
            )
        }
        Ok(Refresh::InFlight) => {
            ui::style_text("A download is already in progress", ui::StyleType::Subtle)
        }
        Err(e) => ui::error_text(&e),
    }
}

fn spawn_refresh(
    board: &Arc<RateBoard>,
    feed: &Arc<dyn RateFeed>,
    done: &UnboundedSender<Result<Refresh, RateError>>,
) {
    let board = Arc::clone(board);
    let feed = Arc::clone(feed);
    let done = done.clone();
    tokio::spawn(async move {
        let outcome = board.refresh(feed.as_ref()).await;
        // The session may already be over.
        let _ = done.send(outcome);
    });
}

fn respond(board: &RateBoard, command: Command) -> String {
    match command {
        Command::Convert { amount, from, to } => match board.convert_text(&amount, &from, &to) {
            Ok(conversion) => ui::style_text(&conversion.to_string(), ui::StyleType::Result),
            Err(e) => ui::error_text(&e),
        },
        Command::List => rates::render_rates(&board.snapshot()),
        Command::Help => HELP.to_string(),
        Command::Unrecognized(line) => ui::style_text(
            &format!("Unrecognized command '{line}', type `help`"),
            ui::StyleType::Error,
        ),
        Command::Refresh | Command::Quit => String::new(),
    }
}

/// Runs the session until `quit` or end of input.
pub async fn run<R, W>(
    board: Arc<RateBoard>,
    feed: Arc<dyn RateFeed>,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (done_tx, mut done_rx) = unbounded_channel();
    spawn_refresh(&board, &feed, &done_tx);
    writeln!(
        out,
        "{}",
        ui::style_text("Fetching daily rates... (type `help`)", ui::StyleType::Subtle)
    )?;

    let mut lines = input.lines();
    loop {
        tokio::select! {
            biased;
            Some(outcome) = done_rx.recv() => {
                writeln!(out, "{}", describe_refresh(outcome))?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Input closed, ending session");
                    break;
                };
                match parse_command(&line) {
                    None => {}
                    Some(Command::Quit) => break,
                    Some(Command::Refresh) => {
                        spawn_refresh(&board, &feed, &done_tx);
                        writeln!(out, "{}", ui::style_text("Fetching daily rates...", ui::StyleType::Subtle))?;
                    }
                    Some(command) => writeln!(out, "{}", respond(&board, command))?,
                }
            }
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BaseCurrency, CurrencyRecord, FeedSnapshot};
    use async_trait::async_trait;

    struct StaticFeed;

    #[async_trait]
    impl RateFeed for StaticFeed {
        async fn fetch(&self) -> crate::core::error::Result<FeedSnapshot> {
            Ok(FeedSnapshot {
                date: None,
                records: vec![
                    CurrencyRecord {
                        code: "USD".to_string(),
                        name: "Доллар США".to_string(),
                        nominal: 1.0,
                        value: 90.0,
                    },
                    CurrencyRecord {
                        code: "EUR".to_string(),
                        name: "Евро".to_string(),
                        nominal: 1.0,
                        value: 100.0,
                    },
                ],
            })
        }
    }

    async fn loaded_board() -> RateBoard {
        let board = RateBoard::new(BaseCurrency::default());
        board.refresh(&StaticFeed).await.unwrap();
        board
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("LIST"), Some(Command::List));
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command("refresh"), Some(Command::Refresh));
        assert_eq!(
            parse_command(" 100  usd eur "),
            Some(Command::Convert {
                amount: "100".to_string(),
                from: "usd".to_string(),
                to: "eur".to_string(),
            })
        );
        assert_eq!(
            parse_command("USD EUR"),
            Some(Command::Convert {
                amount: String::new(),
                from: "USD".to_string(),
                to: "EUR".to_string(),
            })
        );
        assert_eq!(
            parse_command("convert 1 2 3 4"),
            Some(Command::Unrecognized("convert 1 2 3 4".to_string()))
        );
    }

    #[tokio::test]
    async fn test_respond_reports_each_condition() {
        console::set_colors_enabled(false);
        let board = loaded_board().await;

        assert_eq!(
            respond(&board, parse_command("100 USD EUR").unwrap()),
            "100.00 USD = 90.00 EUR"
        );
        assert_eq!(
            respond(&board, parse_command("USD EUR").unwrap()),
            "Invalid amount: amount is empty"
        );
        assert_eq!(
            respond(&board, parse_command("abc USD EUR").unwrap()),
            "Invalid amount: 'abc' is not a number"
        );
        assert_eq!(
            respond(&board, parse_command("1 USD XYZ").unwrap()),
            "Unknown currency: XYZ"
        );
    }

    #[test]
    fn test_describe_refresh() {
        console::set_colors_enabled(false);
        assert_eq!(
            describe_refresh(Ok(Refresh::Published {
                currencies: 3,
                date: chrono::NaiveDate::from_ymd_opt(2024, 3, 2)
            })),
            "Loaded 3 currencies on 02.03.2024"
        );
        assert_eq!(
            describe_refresh(Err(RateError::Fetch("timeout".to_string()))),
            "Feed unavailable: timeout"
        );
    }

    #[tokio::test]
    async fn test_session_serves_requests_after_background_fetch() {
        console::set_colors_enabled(false);
        let board = Arc::new(RateBoard::new(BaseCurrency::default()));
        let feed: Arc<dyn RateFeed> = Arc::new(StaticFeed);
        let (reader, mut writer) = tokio::io::duplex(1024);
        let mut output = Vec::new();

        let driver = {
            let board = Arc::clone(&board);
            async move {
                while board.snapshot().is_empty() {
                    tokio::task::yield_now().await;
                }
                tokio::io::AsyncWriteExt::write_all(&mut writer, b"100 USD RUB\nlist\nquit\n")
                    .await
                    .unwrap();
            }
        };

        let (result, ()) = tokio::join!(
            run(board, feed, tokio::io::BufReader::new(reader), &mut output),
            driver
        );
        result.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Fetching daily rates..."));
        assert!(output.contains("100.00 USD = 9000.00 RUB"));
        assert!(output.contains("Российский рубль"));
        assert!(output.contains("Евро"));
    }
}
