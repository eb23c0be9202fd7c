//! Report rendering and report email composition
//!
//! Reports are attached as plain-text documents. Each room section lists
//! the expected items that were found, the missing items with counts, the
//! suggestion and the tenant's notes.

use homie_common::time::{date_stamp, long_date};

use crate::models::{Home, InspectionReport, OverallStatus, RoomInspectionReport};
use crate::services::mail_client::{MailAttachment, OutgoingMail};

const EMPTY_ROOM_TEXT: &str = "No items or notes were recorded for this room.";

/// Attachment file name, e.g. `Inspection_Report_Lake_House_2025-07-04.txt`
pub fn attachment_filename(report: &InspectionReport) -> String {
    let home: Vec<&str> = report.home_name.split_whitespace().collect();
    format!(
        "Inspection_Report_{}_{}.txt",
        home.join("_"),
        date_stamp(&report.inspection_date)
    )
}

/// Email subject line
pub fn subject(report: &InspectionReport) -> String {
    format!(
        "Inspection Report for {} - {}",
        report.home_name,
        long_date(&report.inspection_date)
    )
}

fn render_room(out: &mut String, room: &RoomInspectionReport) {
    out.push_str(&format!("\n== {} ==\n", room.room_name));

    let found = room.found_items();
    let notes = room
        .tenant_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    if found.is_empty() && room.discrepancies.is_empty() && notes.is_none() {
        out.push_str(EMPTY_ROOM_TEXT);
        out.push('\n');
        return;
    }

    if !found.is_empty() {
        out.push_str("Items found:\n");
        for item in found {
            out.push_str(&format!("  - {} (x{})\n", item.name, item.count));
        }
    }

    if !room.discrepancies.is_empty() {
        out.push_str("Missing items:\n");
        for d in &room.discrepancies {
            out.push_str(&format!(
                "  - {}: expected {}, found {} ({})\n",
                d.name, d.expected_count, d.actual_count, d.note
            ));
        }
    }

    if !room.missing_item_suggestion.trim().is_empty() {
        out.push_str(&format!("Suggestion: {}\n", room.missing_item_suggestion.trim()));
    }

    if let Some(notes) = notes {
        out.push_str(&format!("Tenant notes: {}\n", notes));
    }
}

/// Plain-text report document
pub fn render_text(report: &InspectionReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Inspection Report: {}\n", report.home_name));
    out.push_str(&format!("Owner: {}\n", report.home_owner_name));
    out.push_str(&format!("Inspected by: {}\n", report.inspected_by));
    out.push_str(&format!("Date: {}\n", long_date(&report.inspection_date)));
    out.push_str(&format!("Status: {}\n", report.overall_status));

    for room in &report.rooms {
        render_room(&mut out, room);
    }
    out
}

fn status_text(status: &OverallStatus) -> &'static str {
    match status {
        OverallStatus::AllClear => {
            "Good news! The analysis found no discrepancies during this inspection. All items were accounted for."
        }
        OverallStatus::WithDiscrepancies => {
            "Some items seem to be missing. Please check the attached report for details."
        }
        OverallStatus::Other(_) => "",
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Email delivering `report` to the home's owner
///
/// `dashboard_url` is linked from the body when known.
pub fn compose_email(report: &InspectionReport, home: &Home, dashboard_url: Option<&str>) -> OutgoingMail {
    let date = long_date(&report.inspection_date);
    let status = status_text(&report.overall_status);

    let mut text_body = format!(
        "Dear {},\n\nPlease find attached the inspection report for your property \"{}\", conducted by {} on {}.\n\n",
        home.owner_display_name, report.home_name, report.inspected_by, date
    );
    if !status.is_empty() {
        text_body.push_str(status);
        text_body.push_str("\n\n");
    }
    if let Some(url) = dashboard_url {
        text_body.push_str(&format!("You can manage your homes from your dashboard: {}\n\n", url));
    }
    text_body.push_str("Thank you,\nHomie Inspections");

    let mut html_body = format!(
        "<p>Dear {},</p><p>Please find attached the inspection report for your property \"<strong>{}</strong>\", conducted by <strong>{}</strong> on <strong>{}</strong>.</p>",
        escape_html(&home.owner_display_name),
        escape_html(&report.home_name),
        escape_html(&report.inspected_by),
        escape_html(&date)
    );
    if !status.is_empty() {
        html_body.push_str(&format!("<p>{}</p>", status));
    }
    if let Some(url) = dashboard_url {
        html_body.push_str(&format!("<p><a href=\"{0}\">{0}</a></p>", escape_html(url)));
    }
    html_body.push_str("<p>Thank you,<br/>Homie Inspections</p>");

    OutgoingMail {
        to_email: home.owner_email.clone(),
        to_name: home.owner_display_name.clone(),
        subject: subject(report),
        text_body,
        html_body,
        attachment: Some(MailAttachment {
            filename: attachment_filename(report),
            content_type: "text/plain".to_string(),
            bytes: render_text(report).into_bytes(),
        }),
    }
}
