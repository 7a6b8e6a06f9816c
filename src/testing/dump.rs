//! Job dump interchange format.
//!
//! A job dump captures one staged job as a small text file consumed by
//! the RTL testbenches:
//!
//! ```text
//! <free-form test name>
//! <command word, 8 hex digits>
//! <five loop bounds>
//! <three AGU byte offsets relative to the scratchpad base>
//! <five signed AGU0 strides>
//! <five signed AGU1 strides>
//! <five signed AGU2 strides>
//! ```
//!
//! Bounds are the hardware count-minus-one values and strides are the
//! incremental byte deltas, i.e. exactly what sits in the registers.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::device::command::{CommandWord, N_AGUS, N_HW_LOOPS};
use crate::engine::job::JobDescriptor;

/// One staged job in interchange form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDump {
    /// Free-form test name.
    pub name: String,
    /// Composed 32-bit command word.
    pub command: u32,
    /// Hardware loop bounds (iteration counts minus one).
    pub loop_bounds: [u32; N_HW_LOOPS],
    /// AGU byte offsets relative to the scratchpad base.
    pub agu_offs: [u32; N_AGUS],
    /// Incremental byte strides, one row per AGU.
    pub strides: [[i32; N_HW_LOOPS]; N_AGUS],
}

impl JobDump {
    /// Capture a staged descriptor.
    pub fn from_job(job: &JobDescriptor, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: job.command_word(),
            loop_bounds: *job.loop_bounds(),
            agu_offs: *job.agu_bases(),
            strides: *job.strides(),
        }
    }

    /// Write the dump in interchange form.
    pub fn write<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{}", self.name)?;
        writeln!(out, "{:08X}", self.command)?;
        writeln!(out, "{}", join(self.loop_bounds.iter()))?;
        writeln!(out, "{}", join(self.agu_offs.iter()))?;
        for row in &self.strides {
            writeln!(out, "{}", join(row.iter()))?;
        }
        Ok(())
    }

    /// Write the dump to a file.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating job dump {}", path.display()))?;
        self.write(BufWriter::new(file))
            .with_context(|| format!("writing job dump {}", path.display()))?;
        Ok(())
    }

    /// Parse a dump back from interchange form.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let mut next = |what: &str| {
            lines.next().ok_or_else(|| anyhow!("job dump truncated before {what}"))
        };

        let name = next("test name")?.trim().to_string();
        let command = u32::from_str_radix(next("command word")?.trim(), 16)
            .context("parsing command word")?;

        let loop_bounds = parse_row(next("loop bounds")?, "loop bound")?;
        let agu_offs = parse_row(next("AGU offsets")?, "AGU offset")?;

        let mut strides = [[0i32; N_HW_LOOPS]; N_AGUS];
        for (agu, row) in strides.iter_mut().enumerate() {
            *row = parse_row(next("stride row")?, "stride")
                .with_context(|| format!("AGU{agu} strides"))?;
        }

        Ok(Self { name, command, loop_bounds, agu_offs, strides })
    }

    /// The decoded command word.
    pub fn command_word(&self) -> CommandWord {
        CommandWord::decode(self.command)
    }
}

impl fmt::Display for JobDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  cmd 0x{:08X}: {}", self.command, self.command_word())?;
        writeln!(f, "  bounds {:?}", self.loop_bounds)?;
        writeln!(f, "  offs   {:?}", self.agu_offs)?;
        for (agu, row) in self.strides.iter().enumerate() {
            writeln!(f, "  agu{agu}   {row:?}")?;
        }
        Ok(())
    }
}

fn join<T: fmt::Display>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

fn parse_row<T, const N: usize>(line: &str, what: &str) -> Result<[T; N]>
where
    T: std::str::FromStr + Default + Copy,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let mut out = [T::default(); N];
    let mut fields = line.split_whitespace();
    for (k, slot) in out.iter_mut().enumerate() {
        let field = fields.next().ok_or_else(|| anyhow!("missing {what} {k}"))?;
        *slot = field.parse().with_context(|| format!("parsing {what} {k}"))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> JobDescriptor {
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(1, 0, 2, &[20, 20, 0, 0, 0], &[
            [1, 0, 0, 0, 0],
            [0, 1, 0, 0, 0],
            [1, 20, 0, 0, 0],
        ])
        .unwrap();
        job.stage_agu_offs(0x40, 0x80, 0);
        job.stage_cmd(3, 1, 0, 1, false);
        job
    }

    #[test]
    fn test_write_parse_roundtrip() {
        let dump = JobDump::from_job(&sample_job(), "outer_product_20x20");

        let mut buf = Vec::new();
        dump.write(&mut buf).unwrap();
        let parsed = JobDump::parse(std::str::from_utf8(&buf).unwrap()).unwrap();

        assert_eq!(parsed, dump);
    }

    #[test]
    fn test_interchange_layout() {
        let dump = JobDump::from_job(&sample_job(), "case");
        let mut buf = Vec::new();
        dump.write(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "case");
        assert_eq!(lines[1], format!("{:08X}", dump.command));
        assert_eq!(lines[2], "19 19 0 0 0");
        assert_eq!(lines[3], "64 128 0");
        assert_eq!(lines[4], "4 -76 0 0 0");
    }

    #[test]
    fn test_parse_rejects_truncation() {
        let dump = JobDump::from_job(&sample_job(), "case");
        let mut buf = Vec::new();
        dump.write(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let short: String = text.lines().take(4).collect::<Vec<_>>().join("\n");

        assert!(JobDump::parse(&short).is_err());
    }
}
