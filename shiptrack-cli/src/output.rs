use std::io::{self, Write};

use shiptrack_core::model::ShipmentInformation;

/// Print a human readable timeline, one event per line in carrier order.
pub(crate) fn write_timeline<W: Write>(
    out: &mut W,
    carrier: &str,
    tracking_number: &str,
    info: &ShipmentInformation,
) -> io::Result<()> {
    writeln!(out, "{carrier} {tracking_number}")?;

    if info.events().is_empty() {
        writeln!(out, "  no events reported")?;
    }
    for event in info.events() {
        let kind = event.event_type().map(|kind| format!(" [{kind}]")).unwrap_or_default();
        let date = event
            .date()
            .map_or_else(|| "(no date)".to_owned(), ToString::to_string);
        write!(out, "  {date}{kind}  {}", event.label())?;
        if let Some(location) = event.location() {
            write!(out, " ({location})")?;
        }
        writeln!(out)?;
    }

    if let Some(estimate) = info.estimated_delivery_date() {
        writeln!(out, "Estimated delivery: {estimate}")?;
    }
    if let Some(delivered) = info.delivered_at() {
        writeln!(out, "Delivered at: {delivered}")?;
    }

    Ok(())
}

/// Print the shipment as pretty JSON.
pub(crate) fn write_json<W: Write>(out: &mut W, info: &ShipmentInformation) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, info)?;
    writeln!(out)
}
