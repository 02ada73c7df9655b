//! Octave text matrix writer
//!
//! Writes each vector in the format Octave's `load` reads:
//!
//! ```text
//! # name: foff_log_c
//! # type: matrix
//! # rows: 1
//! # columns: 3
//!  0.000000 -0.125000 0.250000
//! ```

use std::io::Write;

use snafu::ResultExt;

use super::{Recorder, Samples, Shape};
use crate::error::{RecordSnafu, Result};

/// Recorder writing Octave text matrices to any writer
pub struct OctaveWriter<W: Write> {
    out: W,
}

impl<W: Write> OctaveWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write a `#` comment line, e.g. a file banner
    pub fn comment(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "# {}", text).context(RecordSnafu { name: "comment" })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().context(RecordSnafu { name: "output" })
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_matrix(&mut self, name: &str, samples: &Samples, shape: Shape) -> std::io::Result<()> {
        let kind = match samples {
            Samples::Complex(_) => "complex matrix",
            _ => "matrix",
        };
        writeln!(self.out, "# name: {}", name)?;
        writeln!(self.out, "# type: {}", kind)?;
        writeln!(self.out, "# rows: {}", shape.rows)?;
        writeln!(self.out, "# columns: {}", shape.cols)?;

        for r in 0..shape.rows {
            for c in 0..shape.cols {
                let i = r * shape.stride + c;
                match samples {
                    Samples::Int(v) => write!(self.out, " {}", v[i])?,
                    Samples::Float(v) => write!(self.out, " {:.6}", v[i])?,
                    Samples::Complex(v) => write!(self.out, " ({:.6},{:.6})", v[i].re, v[i].im)?,
                }
            }
            writeln!(self.out)?;
        }
        write!(self.out, "\n\n")
    }
}

impl<W: Write> Recorder for OctaveWriter<W> {
    fn save(&mut self, name: &str, samples: &Samples, shape: Shape) -> Result<()> {
        self.write_matrix(name, samples, shape)
            .context(RecordSnafu { name })
    }
}
