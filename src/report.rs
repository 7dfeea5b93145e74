//! This module is in charge of writing results to disk: the list of bitmask
//! variations, the derived tables, and a short run summary

use crate::{
    bitmask::Variation,
    derived::DerivedTables,
    layout::CutLayout,
    numeric::{reals, Float},
    skim::SkimStatistics,
    Result,
};

use eyre::WrapErr;
use time::{format_description, OffsetDateTime};

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    time::Duration,
};

/// Number of significant digits in text output
const SIG_DIGITS: usize = (reals::DIGITS - 1) as usize;

/// Timestamp of the current time, as written in report headers
pub fn timestamp() -> Result<String> {
    let format = format_description::parse_borrowed::<1>(
        "[day]-[month repr:short]-[year repr:last_two]   [hour]:[minute]:[second]",
    )?;
    Ok(OffsetDateTime::now_utc().format(&format)?)
}

/// Write a list of bitmask variations to a file
///
/// The file starts with a timestamp and the cut layout, followed by one line
/// per variation. Returns the number of variations that were written.
///
pub fn write_variations(
    path: impl AsRef<Path>,
    layout: &CutLayout,
    variations: impl IntoIterator<Item = Variation>,
) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path)
        .wrap_err_with(|| format!("Failed to create variation file {}", path.display()))?;
    let mut file = BufWriter::new(file);
    let count = write_variation_list(&mut file, &timestamp()?, layout, variations)?;
    file.flush()?;
    tracing::info!(count, path = %path.display(), "wrote bitmask variations");
    Ok(count)
}

/// Variation list formatting, separate from file handling for testability
fn write_variation_list(
    out: &mut impl Write,
    timestamp: &str,
    layout: &CutLayout,
    variations: impl IntoIterator<Item = Variation>,
) -> io::Result<usize> {
    writeln_kv(out, timestamp)?;
    writeln_kv(out, "---------------------------------------------")?;
    write!(out, "{}", layout)?;
    writeln_kv(out, "---------------------------------------------")?;
    let mut count = 0;
    for variation in variations {
        writeln!(out, "{}", variation)?;
        count += 1;
    }
    Ok(count)
}

/// Write the derived tables as JSON
pub fn write_tables(path: impl AsRef<Path>, tables: &DerivedTables) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .wrap_err_with(|| format!("Failed to create output file {}", path.display()))?;
    let mut file = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut file, tables)
        .wrap_err("Failed to serialize the derived tables")?;
    file.flush()?;
    tracing::info!(
        collisions = tables.collisions.len(),
        particles = tables.particles.len(),
        path = %path.display(),
        "wrote derived tables"
    );
    Ok(())
}

/// Write a summary of a skimming run
pub fn write_summary(
    out: &mut impl Write,
    stats: &SkimStatistics,
    elapsed_time: Duration,
) -> io::Result<()> {
    let elapsed_secs = elapsed_time.as_secs_f64() as Float;
    writeln_kv(out, ("Events processed", stats.processed))?;
    writeln_kv(out, ("... accepted", stats.accepted))?;
    writeln_kv(out, ("... rejected by the gate", stats.rejected))?;
    writeln_kv(out, ("... dropped as malformed", stats.malformed))?;
    writeln_kv(out, ("Orphaned child references", stats.orphaned))?;
    writeln_kv(out, ("Elapsed time (s)", elapsed_secs))?;
    if stats.processed > 0 {
        let secs_per_ev = elapsed_secs / (stats.processed as Float);
        writeln_kv(out, ("Time per event (s)", secs_per_ev))?;
    }
    Ok(())
}

/// Text output with a leading space and fixed-width key columns
fn writeln_kv(out: &mut impl Write, data: impl WriteKv) -> io::Result<()> {
    write!(out, " ")?;
    data.write(out)?;
    writeln!(out)
}

/// Things which can be printed in a report
trait WriteKv: Sized {
    /// Write down `self` to the output
    fn write(self, out: &mut impl Write) -> io::Result<()>;
}

impl WriteKv for &str {
    fn write(self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{}", self)
    }
}

impl WriteKv for usize {
    fn write(self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{}", self)
    }
}

impl WriteKv for Float {
    fn write(self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{}", format_general(self, SIG_DIGITS))
    }
}

impl<T: WriteKv> WriteKv for (&str, T) {
    fn write(self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{:<31}: ", self.0)?;
        self.1.write(out)
    }
}

/// Format a floating-point number the way printf's %g would
///
/// Naive notation is used as long as it needs at most three leading zeroes
/// after the decimal point and no more digits than requested before it.
/// Otherwise, scientific notation is used.
///
fn format_general(x: Float, sig_digits: usize) -> String {
    // Zero has no order of magnitude, print it as is
    if x == 0. {
        return "0".to_owned();
    }

    // Pick the notation from the decimal order of magnitude
    let magnitude = x.abs().log10().floor() as isize;
    if magnitude < -3 || magnitude >= sig_digits as isize {
        return format!("{:.1$e}", x, sig_digits - 1);
    }

    // In naive notation, Rust's precision counts digits after the decimal
    // point, so digits spent before it (or on leading zeroes) are deducted
    let decimals = (sig_digits as isize - 1 - magnitude).max(0) as usize;
    let naive = format!("{:.1$}", x, decimals);

    // Trailing zeroes carry no information, nor does a lone decimal point
    if naive.contains('.') {
        naive.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        naive
    }
}
