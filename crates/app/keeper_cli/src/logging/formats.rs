use std::io::Write;

use flexi_logger::{DeferredNow, Record, style};

/// `LEVEL message` with the level colored.
pub fn cli_format(w: &mut dyn Write, _now: &mut DeferredNow, record: &Record) -> std::io::Result<()> {
    let level = record.level();
    write!(w, "{} {}", style(level).paint(level.to_string()), record.args())
}
