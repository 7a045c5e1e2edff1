use super::ui;
use crate::core::{RateBoard, RateFeed, RateTable};

/// Renders the table in selection order: base currency first, then feed order.
pub fn render_rates(table: &RateTable) -> String {
    if table.is_empty() {
        return ui::style_text("No rates loaded yet", ui::StyleType::Subtle);
    }

    let base = &table.base().code;
    let mut rates = ui::new_styled_table();
    rates.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell(&format!("Rate ({base})")),
    ]);
    for (code, name) in table.currencies() {
        let rate = table.rate(code).unwrap_or_default();
        rates.add_row(vec![
            comfy_table::Cell::new(code),
            comfy_table::Cell::new(name),
            ui::number_cell(format!("{rate:.4}")),
        ]);
    }

    let title = match table.date() {
        Some(date) => format!("Rates on {}", date.format("%d.%m.%Y")),
        None => "Rates".to_string(),
    };
    format!(
        "{}\n\n{}",
        ui::style_text(&title, ui::StyleType::Title),
        rates
    )
}

/// Fetches the feed and prints every available currency.
pub async fn run(board: &RateBoard, feed: &dyn RateFeed) -> anyhow::Result<()> {
    let spinner = ui::new_spinner("Fetching daily rates...");
    let outcome = board.refresh(feed).await;
    spinner.finish_and_clear();
    outcome.inspect_err(ui::report_error)?;

    println!("{}", render_rates(&board.snapshot()));
    Ok(())
}
