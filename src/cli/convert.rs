use super::ui;
use crate::core::{RateBoard, RateFeed, convert};

/// Fetches the feed and prints a single conversion.
///
/// The amount is validated first so bad input never touches the network.
pub async fn run(
    board: &RateBoard,
    feed: &dyn RateFeed,
    amount: &str,
    from: &str,
    to: &str,
) -> anyhow::Result<()> {
    let amount = convert::parse_amount(amount).inspect_err(ui::report_error)?;

    let spinner = ui::new_spinner("Fetching daily rates...");
    let outcome = board.refresh(feed).await;
    spinner.finish_and_clear();
    outcome.inspect_err(ui::report_error)?;

    let table = board.snapshot();
    let conversion =
        convert::convert(&table, amount, from, to).inspect_err(ui::report_error)?;
    println!(
        "{}",
        ui::style_text(&conversion.to_string(), ui::StyleType::Result)
    );
    if let Some(date) = table.date() {
        println!(
            "{}",
            ui::style_text(
                &format!("Rates on {}", date.format("%d.%m.%Y")),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
