use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tracing::info;

use crate::config::MailSettings;
use crate::error::CollaboratorError;
use crate::models::PropertyListing;
use crate::pipeline::Notifier;

const API_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// How many listings get full detail in the digest; the rest are summarized
/// with a pointer to the spreadsheet.
const MAX_DETAILED: usize = 5;

/// Sends one HTML digest per cycle through a transactional-email API.
pub struct DigestMailer {
    client: reqwest::Client,
    settings: MailSettings,
    sheet_url: String,
}

impl DigestMailer {
    pub fn new(settings: MailSettings, sheet_url: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            settings,
            sheet_url,
        })
    }
}

#[async_trait]
impl Notifier for DigestMailer {
    async fn notify_new_listings(
        &self,
        listings: &[PropertyListing],
    ) -> Result<(), CollaboratorError> {
        if listings.is_empty() {
            return Ok(());
        }

        let subject = format!("新着物件通知 ({})", Local::now().format("%Y/%m/%d %H:%M"));
        let html = build_digest_html(listings, &self.sheet_url);

        let payload = serde_json::json!({
            "sender": {
                "name": self.settings.sender_name,
                "email": self.settings.sender_email,
            },
            "to": [{ "email": self.settings.recipient }],
            "subject": subject,
            "htmlContent": html,
        });

        let resp = self
            .client
            .post(API_URL)
            .header("api-key", &self.settings.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CollaboratorError::Notify(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Notify(format!(
                "mail api returned {}: {}",
                status, detail
            )));
        }

        info!("Sent digest mail for {} new listings", listings.len());
        Ok(())
    }
}

/// Digest body: a summary block linking the spreadsheet, then up to
/// `MAX_DETAILED` listings with their card fields.
fn build_digest_html(listings: &[PropertyListing], sheet_url: &str) -> String {
    let total = listings.len();
    let mut html = format!(
        r#"<html><body>
<div style="background-color:#f8f9fa;padding:10px;border-radius:5px;">
<h2>新着物件が{total}件見つかりました</h2>
<p>スプレッドシート: <a href="{sheet_url}">{sheet_url}</a></p>
"#
    );
    if total > MAX_DETAILED {
        html.push_str(&format!(
            "<p>※ 上位{MAX_DETAILED}件のみ表示しています。全{total}件はスプレッドシートでご確認ください。</p>\n"
        ));
    }
    html.push_str("</div>\n<hr>\n");

    for listing in listings.iter().take(MAX_DETAILED) {
        let field = |label: &str, value: &Option<String>| {
            format!(
                "<p><strong>{}:</strong> {}</p>\n",
                label,
                value.as_deref().unwrap_or("-")
            )
        };
        let yen = |v: Option<u64>| v.map(|n| format!("{}円", n)).unwrap_or_else(|| "-".to_string());

        html.push_str("<div style=\"border:1px solid #ddd;padding:10px;margin:10px 0;border-radius:5px;\">\n");
        html.push_str(&format!(
            "<h3>{}</h3>\n",
            listing.name.as_deref().unwrap_or("(物件名不明)")
        ));
        html.push_str(&field("所在地", &listing.location));
        html.push_str(&format!("<p><strong>賃料:</strong> {}</p>\n", yen(listing.rent)));
        html.push_str(&field("間取り", &listing.layout));
        html.push_str(&format!(
            "<p><strong>専有面積:</strong> {}</p>\n",
            listing
                .area_sqm
                .map(|a| format!("{}m²", a))
                .unwrap_or_else(|| "-".to_string())
        ));
        html.push_str(&field("アクセス", &listing.access));
        html.push_str(&format!(
            "<p><strong>築年数:</strong> {}</p>\n",
            match listing.building_age.display() {
                s if s.is_empty() => "-".to_string(),
                s => s,
            }
        ));
        html.push_str(&format!("<p><strong>管理費:</strong> {}</p>\n", yen(listing.management_fee)));
        html.push_str(&format!("<p><strong>敷金:</strong> {}</p>\n", yen(listing.deposit)));
        html.push_str(&format!("<p><strong>礼金:</strong> {}</p>\n", yen(listing.key_money)));
        html.push_str(&format!(
            "<p><strong>詳細URL:</strong> <a href=\"{0}\">{0}</a></p>\n",
            listing.url
        ));
        if let Some(img) = &listing.main_image_url {
            html.push_str(&format!(
                "<img src=\"{}\" alt=\"物件画像\" style=\"max-width:300px;\">\n",
                img
            ));
        }
        html.push_str("</div>\n<hr>\n");
    }

    html.push_str("</body></html>\n");
    html
}
