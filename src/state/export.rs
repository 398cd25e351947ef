//! Winners report for the auction admin.
//!
//! One block per item that has at least one bid, rendered as plain text
//! and served as a download.

use super::AppState;
use crate::money::format_money;
use crate::status::item_status;
use crate::store::StoreResult;
use crate::types::*;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

const HEAVY_RULE: &str = "==================================================";
const LIGHT_RULE: &str = "--------------------------------------------------";

/// One won item in the report
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WinnerRow {
    pub item_id: ItemId,
    pub item_title: String,
    /// Pre-formatted, e.g. `£105`
    pub winning_bid: String,
    pub winner_name: String,
    pub winner_email: String,
    pub winner_phone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WinnersReport {
    pub filename: String,
    pub body: String,
    pub winners: usize,
}

impl WinnersReport {
    pub fn render(
        auction_name: &str,
        rows: &[WinnerRow],
        generated: DateTime<Local>,
        today: NaiveDate,
    ) -> Self {
        let mut body = format!("{} - WINNERS REPORT\n", auction_name.to_uppercase());
        body.push_str(&format!(
            "Generated: {}\n",
            generated.format("%-m/%-d/%Y, %-I:%M:%S %p")
        ));
        body.push_str(HEAVY_RULE);
        body.push_str("\n\n");

        for row in rows {
            body.push_str(&format!("Item #{}: {}\n", row.item_id, row.item_title));
            body.push_str(&format!("Winning Bid: {}\n", row.winning_bid));
            body.push_str(&format!("Winner: {}\n", row.winner_name));
            if !row.winner_email.is_empty() {
                body.push_str(&format!("Email: {}\n", row.winner_email));
            }
            if !row.winner_phone.is_empty() {
                body.push_str(&format!("Phone: {}\n", row.winner_phone));
            }
            body.push_str(LIGHT_RULE);
            body.push_str("\n\n");
        }

        body.push_str(&format!("Total Items Won: {}\n", rows.len()));

        Self {
            filename: format!("auction-winners-{}.txt", today.format("%Y-%m-%d")),
            body,
            winners: rows.len(),
        }
    }
}

impl AppState {
    /// Collect the winner of every item with bids, ordered by item id
    pub async fn winner_rows(&self) -> StoreResult<Vec<WinnerRow>> {
        let items = self.store.read_all_items().await?;
        let mut rows = Vec::new();

        for item in &items {
            let status = item_status(item);
            let Some(uid) = status.winner else {
                continue;
            };

            let profile = match self.store.read_profile(&uid).await {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::warn!(item_id = item.id, uid = %uid, "Winner profile unavailable: {}", e);
                    None
                }
            };
            let (name, email, phone) = match profile {
                Some(p) if !p.name.is_empty() => (p.name, p.email, p.phone),
                Some(p) => ("Unknown".to_string(), p.email, p.phone),
                None => ("Unknown".to_string(), String::new(), String::new()),
            };

            rows.push(WinnerRow {
                item_id: item.id,
                item_title: item.title.clone(),
                winning_bid: format_money(&item.currency, status.amount),
                winner_name: name,
                winner_email: email,
                winner_phone: phone,
            });
        }

        Ok(rows)
    }

    /// Build the winners report, or `None` when nothing has been won yet
    pub async fn export_winners(&self) -> StoreResult<Option<WinnersReport>> {
        let rows = self.winner_rows().await?;
        if rows.is_empty() {
            tracing::info!("Winners export requested with no winners");
            return Ok(None);
        }

        let report = WinnersReport::render(
            &self.config.auction_name,
            &rows,
            Local::now(),
            Utc::now().date_naive(),
        );
        tracing::info!(winners = report.winners, filename = %report.filename, "Winners report generated");
        Ok(Some(report))
    }
}
