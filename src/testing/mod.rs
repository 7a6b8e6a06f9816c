//! Deterministic test-vector generation.
//!
//! [`run_suite`] produces the scenario set used to validate the RTL:
//! for every case it writes the initial memory image (`iniNNNN.txt`),
//! the staged job (`jobNNNN.txt`), runs the functional model, and
//! writes the expected memory image (`expNNNN.txt`). Data is drawn
//! from a fixed-seed generator so reruns produce identical vectors.
//!
//! The suite sweeps every opcode through its init/aux/polarity
//! variants on the kernel geometries the accelerator was built for:
//! 1D/2D/3D reductions, elementwise vector ops, a 20x20 outer product,
//! extremum scans, thresholding, masking (compare and counter modes),
//! masked accumulation and bulk copies.

pub mod dump;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::device::scratchpad::Scratchpad;
use crate::engine::job::JobDescriptor;

pub use dump::JobDump;

/// Seed for the vector generator. Fixed so the suite is reproducible.
const SUITE_SEED: u64 = 0x7A75_2020;

/// Word pattern the scratchpad is wiped with between cases, so stray
/// writes show up in the expected images.
const WIPE_PATTERN: u32 = 0x5555_5555;

/// Generate the full suite into `outdir`.
pub fn run_suite(outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory {}", outdir.display()))?;

    let mut suite = Suite::new(outdir);

    suite.mac_1d()?;
    suite.mac_2d()?;
    suite.mac_3d()?;
    suite.vaddsub()?;
    suite.vmult()?;
    suite.outer_product()?;
    suite.maxmin()?;
    suite.threshold()?;
    suite.mask_compare()?;
    suite.mask_counter()?;
    suite.maskmac_compare()?;
    suite.maskmac_counter()?;
    suite.copy_replicate()?;
    suite.copy_vector()?;

    log::info!("suite complete: {} cases in {}", suite.index, outdir.display());
    Ok(())
}

struct Suite {
    outdir: PathBuf,
    rng: StdRng,
    mem: Scratchpad,
    index: u32,
}

impl Suite {
    fn new(outdir: &Path) -> Self {
        Self {
            outdir: outdir.to_path_buf(),
            rng: StdRng::seed_from_u64(SUITE_SEED),
            mem: Scratchpad::new(Config::get().scratchpad_words()),
            index: 0,
        }
    }

    /// Wipe the scratchpad for the next case.
    fn wipe(&mut self) {
        self.mem.fill(WIPE_PATTERN);
    }

    /// Fill a word range with uniform values in (-1, 1).
    fn randomize(&mut self, word: usize, len: usize) {
        for k in 0..len {
            let v = self.rng.gen_range(-1.0f32..1.0);
            self.mem.store_f32(word + k, v);
        }
    }

    /// Dump initial state and job, run the model, dump expected state.
    fn emit(&mut self, name: &str, job: &mut JobDescriptor) -> Result<()> {
        if Config::get().check_addresses() {
            job.enable_address_check_for(&self.mem);
        }

        self.write_mem(&format!("ini{:04}.txt", self.index))?;
        JobDump::from_job(job, name)
            .write_file(&self.outdir.join(format!("job{:04}.txt", self.index)))?;

        job.issue(&mut self.mem)
            .with_context(|| format!("issuing case {} ({})", self.index, name))?;

        self.write_mem(&format!("exp{:04}.txt", self.index))?;

        log::info!("generated job {}: {}", self.index, name);
        self.index += 1;
        Ok(())
    }

    fn write_mem(&self, file: &str) -> Result<()> {
        let path = self.outdir.join(file);
        let out = File::create(&path)
            .with_context(|| format!("creating memory dump {}", path.display()))?;
        self.mem
            .write_dump(BufWriter::new(out))
            .with_context(|| format!("writing memory dump {}", path.display()))?;
        Ok(())
    }

    /// 1D reduction: init source, ReLU and accumulation sign sweep.
    fn mac_1d(&mut self) -> Result<()> {
        let len = 100u32;
        for k in 0..8u8 {
            self.wipe();
            let op_a = len as usize;
            let op_b = 3 * len as usize;
            self.randomize(op_a, len as usize);
            self.randomize(op_b, len as usize);
            let bias = self.rng.gen_range(-1.0f32..1.0);
            self.mem.store_f32(0, bias);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 1, 1, &[len, 0, 0, 0, 0], &[
                [1, 0, 0, 0, 0],
                [1, 0, 0, 0, 0],
                [0, 0, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(0, 2 + (k & 1), (k >> 1) & 1, 1, (k >> 2) & 1 != 0);
            self.emit(&format!("mac_1d_reduction_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// 10x10 2D reduction, same variant sweep.
    fn mac_2d(&mut self) -> Result<()> {
        let n = 10u32;
        for k in 0..8u8 {
            self.wipe();
            let op_a = 10usize;
            let op_b = 10 + 2 * (n * n) as usize;
            self.randomize(op_a, (n * n) as usize);
            self.randomize(op_b, (n * n) as usize);
            let bias = self.rng.gen_range(-1.0f32..1.0);
            self.mem.store_f32(0, bias);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(2, 2, 2, &[n, n, 0, 0, 0], &[
                [1, n as i32, 0, 0, 0],
                [1, n as i32, 0, 0, 0],
                [0, 0, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(0, 2 + (k & 1), (k >> 1) & 1, 1, (k >> 2) & 1 != 0);
            self.emit(&format!("mac_2d_reduction_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// 3D reduction over 20x20 tiles with 10 channels and a 2D output
    /// walk, exercising all five loop levels.
    fn mac_3d(&mut self) -> Result<()> {
        let volume = 10 * 20 * 20usize;
        for k in 0..8u8 {
            self.wipe();
            self.randomize(volume, volume);
            self.randomize(2 * volume, volume);
            let bias = self.rng.gen_range(-1.0f32..1.0);
            self.mem.store_f32(0, bias);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(3, 3, 5, &[10, 10, 10, 10, 10], &[
                [1, 20, 400, 1, 20],
                [1, 20, 400, 1, 20],
                [0, 0, 0, 1, 10],
            ])?;
            job.stage_agu_offs(volume as u32 * 4, 2 * volume as u32 * 4, 0);
            job.stage_cmd(0, 3 - (k & 1), (k >> 1) & 1, 1, (k >> 2) & 1 != 0);
            self.emit(&format!("mac_3d_reduction_2d_stride_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Elementwise add/subtract with per-element init from AGU1.
    fn vaddsub(&mut self) -> Result<()> {
        let len = 100u32;
        for k in 0..4u8 {
            self.wipe();
            let op_a = len as usize;
            let op_b = 3 * len as usize;
            self.randomize(op_a, len as usize);
            self.randomize(op_b, len as usize);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(0, 0, 1, &[len, 0, 0, 0, 0], &[
                [1, 0, 0, 0, 0],
                [1, 0, 0, 0, 0],
                [1, 0, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(1, 1, k & 1, 1, (k >> 1) & 1 != 0);
            self.emit(&format!("vaddsub_1d_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Elementwise multiply.
    fn vmult(&mut self) -> Result<()> {
        let len = 100u32;
        for k in 0..4u8 {
            self.wipe();
            let op_a = len as usize;
            let op_b = 3 * len as usize;
            self.randomize(op_a, len as usize);
            self.randomize(op_b, len as usize);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(0, 0, 1, &[len, 0, 0, 0, 0], &[
                [1, 0, 0, 0, 0],
                [1, 0, 0, 0, 0],
                [1, 0, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(2, 1, k & 1, 1, (k >> 1) & 1 != 0);
            self.emit(&format!("vmult_1d_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// 20x20 outer product with the scalar latched from AGU1 per row.
    fn outer_product(&mut self) -> Result<()> {
        let n = 20u32;
        for k in 0..4u8 {
            self.wipe();
            let op_a = (n * n + 10) as usize;
            let op_b = (2 * n * n + 10) as usize;
            self.randomize(op_a, n as usize);
            self.randomize(op_b, n as usize);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 0, 2, &[n, n, 0, 0, 0], &[
                [1, 0, 0, 0, 0],
                [0, 1, 0, 0, 0],
                [1, n as i32, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(3, 1, (k >> 1) & 1, 1, k & 1 != 0);
            self.emit(&format!("outer_product_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Extremum scan over AGU1, value and arg-index outputs.
    fn maxmin(&mut self) -> Result<()> {
        let len = 100u32;
        for k in 0..4u8 {
            self.wipe();
            let op_b = 3 * len as usize;
            self.randomize(len as usize, len as usize);
            self.randomize(op_b, len as usize);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 1, 1, &[len, 0, 0, 0, 0], &[
                [0, 0, 0, 0, 0],
                [1, 0, 0, 0, 0],
                [0, 0, 0, 0, 0],
            ])?;
            job.stage_agu_offs(len * 4, op_b as u32 * 4, 0);
            job.stage_cmd(4, 1, k & 1, 1, (k >> 1) & 1 != 0);
            self.emit(&format!("maxmin_1d_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Thresholding of 10 rows of 100 against a per-row threshold,
    /// clip and indicator outputs, both polarities. Compare selector 3
    /// is reserved, so the sweep skips it.
    fn threshold(&mut self) -> Result<()> {
        let volume = 100 * 10usize;
        for k in 0..32u8 {
            let aux = (k >> 1) & 0x7;
            if aux & 0x3 == 0x3 {
                continue;
            }

            self.wipe();
            let op_a = volume;
            let op_b = 2 * volume;
            self.randomize(op_b, volume);
            self.randomize(op_a, 10);

            // plant exact matches for the equality selector
            self.mem.store_f32(op_b + 2, 0.0);
            let planted = self.mem.words()[op_b + 15];
            self.mem.words_mut()[op_a + 1] = planted;

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 0, 2, &[100, 10, 0, 0, 0], &[
                [0, 1, 0, 0, 0],
                [1, 100, 0, 0, 0],
                [1, 100, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(5, 3 * (1 - (k & 1)), aux, 1, (k >> 4) & 1 != 0);
            self.emit(&format!("threshold_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Compare-gated masking over 10 rows of 100 with a zero threshold.
    fn mask_compare(&mut self) -> Result<()> {
        let volume = 100 * 10usize;
        for k in 0..8u8 {
            let aux = k & 0x3;
            if aux == 0x3 {
                continue;
            }

            self.wipe();
            let op_a = volume;
            let op_b = 2 * volume + 50;
            self.randomize(op_a, volume);
            self.randomize(op_b, volume);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(2, 0, 2, &[100, 10, 0, 0, 0], &[
                [1, 100, 0, 0, 0],
                [1, 100, 0, 0, 0],
                [1, 100, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(6, 3, aux, 1, (k >> 2) & 1 != 0);
            self.emit(&format!("mask_compare_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Counter-gated masking: per-row one-hot selection by a literal
    /// iteration number fetched through AGU1.
    fn mask_counter(&mut self) -> Result<()> {
        let volume = 100 * 10usize;
        for k in 0..2u8 {
            self.wipe();
            let op_a = volume;
            let op_b = 2 * volume + 50;
            self.randomize(op_a, volume);
            for n in 0..10 {
                let idx = (50.0 * self.rng.gen_range(-1.0f64..1.0) + 49.0).round().max(0.0);
                self.mem.words_mut()[op_b + n] = idx as u32;
            }

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 0, 2, &[100, 10, 0, 0, 0], &[
                [1, 100, 0, 0, 0],
                [0, 1, 0, 0, 0],
                [1, 100, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(6, 1, 4, 1, k & 1 != 0);
            self.emit(&format!("mask_counter_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Compare-gated masked accumulation into the result stream.
    fn maskmac_compare(&mut self) -> Result<()> {
        let (rows, cols) = (10usize, 100usize);
        for k in 0..8u8 {
            let aux = k & 0x3;
            if aux == 0x3 {
                continue;
            }

            self.wipe();
            let op_a = rows * cols + 10;
            let op_b = rows * cols + rows + 20;
            self.randomize(0, rows * cols);
            self.randomize(op_a, rows);
            for n in 0..rows * cols {
                let gate = (self.rng.gen_range(-1.0f64..1.0) >= 0.0) as u32;
                self.mem.store_f32(op_b + n, gate as f32);
            }

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 0, 2, &[cols as u32, rows as u32, 0, 0, 0], &[
                [0, 1, 0, 0, 0],
                [1, cols as i32, 0, 0, 0],
                [1, cols as i32, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(7, 3, aux, 1, (k >> 2) & 1 != 0);
            self.emit(&format!("maskmac_compare_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Counter-gated masked accumulation: scatter a per-row offset onto
    /// the result position named by a literal column number.
    fn maskmac_counter(&mut self) -> Result<()> {
        let (rows, cols) = (10usize, 100usize);
        for k in 0..2u8 {
            self.wipe();
            let op_a = rows * cols + 10;
            let op_b = rows * cols + rows + 20;
            self.randomize(0, rows * cols);
            self.randomize(op_a, rows);
            for n in 0..rows {
                let half = cols as f64 / 2.0;
                let idx = (half * self.rng.gen_range(-1.0f64..1.0) + half - 1.0).round().max(0.0);
                self.mem.words_mut()[op_b + n] = idx as u32;
            }

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 0, 2, &[cols as u32, rows as u32, 0, 0, 0], &[
                [0, 1, 0, 0, 0],
                [0, 1, 0, 0, 0],
                [1, cols as i32, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, op_b as u32 * 4, 0);
            job.stage_cmd(7, 1, 4, 1, k & 1 != 0);
            self.emit(&format!("maskmac_counter_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Replicate a latched value (zero or a per-row source word) over a
    /// 10x100 output.
    fn copy_replicate(&mut self) -> Result<()> {
        let (rows, cols) = (10usize, 100usize);
        for k in 0..2u8 {
            self.wipe();
            let op_a = rows * cols + 10;
            self.randomize(op_a, cols);

            let mut job = JobDescriptor::new();
            job.stage_loop_nest(1, 0, 2, &[cols as u32, rows as u32, 0, 0, 0], &[
                [0, 1, 0, 0, 0],
                [0, 0, 0, 0, 0],
                [1, cols as i32, 0, 0, 0],
            ])?;
            job.stage_agu_offs(op_a as u32 * 4, 0, 0);
            job.stage_cmd(8, if k != 0 { 0 } else { 3 }, 0, 1, false);
            self.emit(&format!("copy_replicate_{k}"), &mut job)?;
        }
        Ok(())
    }

    /// Bulk copy of a 10x100 block.
    fn copy_vector(&mut self) -> Result<()> {
        let (rows, cols) = (10usize, 100usize);
        self.wipe();
        let op_a = rows * cols + 10;
        self.randomize(op_a, rows * cols);

        let mut job = JobDescriptor::new();
        job.stage_loop_nest(0, 0, 2, &[cols as u32, rows as u32, 0, 0, 0], &[
            [1, cols as i32, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [1, cols as i32, 0, 0, 0],
        ])?;
        job.stage_agu_offs(op_a as u32 * 4, 0, 0);
        job.stage_cmd(8, 3, 1, 1, false);
        self.emit("copy_vector_0", &mut job)?;
        Ok(())
    }
}
