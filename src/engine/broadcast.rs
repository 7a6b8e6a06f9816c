//! Broadcast staging over a group of sibling accelerators.
//!
//! A cluster integrates several identical accelerator instances; it is
//! common to program all of them with the same job shape and only vary
//! the AGU base addresses afterwards. The hardware exposes a broadcast
//! alias address for this; the emulator models it as a handle over a
//! contiguous slice of descriptors. Staging through the handle reaches
//! every sibling, while execution stays per-descriptor: `issue_all`
//! runs the siblings one after the other in index order, which is the
//! defined semantics of the (physically parallel) hardware fan-out.

use crate::device::command::{N_AGUS, N_HW_LOOPS};
use crate::device::scratchpad::Scratchpad;
use crate::engine::job::{JobDescriptor, JobError};

/// Staging handle over a contiguous group of descriptors.
pub struct BroadcastGroup<'a> {
    jobs: &'a mut [JobDescriptor],
}

impl<'a> BroadcastGroup<'a> {
    /// Wrap a slice of sibling descriptors.
    pub fn new(jobs: &'a mut [JobDescriptor]) -> Self {
        Self { jobs }
    }

    /// Number of siblings behind the handle.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the handle is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Stage the same loop nest on every sibling.
    pub fn stage_loop_nest(
        &mut self,
        init_level: u8,
        inner_level: u8,
        outer_level: u8,
        loop_count: &[u32; N_HW_LOOPS],
        element_stride: &[[i32; N_HW_LOOPS]; N_AGUS],
    ) -> Result<(), JobError> {
        for job in self.jobs.iter_mut() {
            job.stage_loop_nest(init_level, inner_level, outer_level, loop_count, element_stride)?;
        }
        Ok(())
    }

    /// Stage the same AGU bases on every sibling.
    pub fn stage_agu_offs(&mut self, base0: u32, base1: u32, base2: u32) {
        for job in self.jobs.iter_mut() {
            job.stage_agu_offs(base0, base1, base2);
        }
    }

    /// Stage the same command on every sibling.
    pub fn stage_cmd(&mut self, opcode: u8, init_sel: u8, aux_func: u8, irq_cfg: u8, polarity: bool) {
        for job in self.jobs.iter_mut() {
            job.stage_cmd(opcode, init_sel, aux_func, irq_cfg, polarity);
        }
    }

    /// Issue every sibling, sequentially in index order.
    pub fn issue_all(&mut self, mem: &mut Scratchpad) -> Result<(), JobError> {
        for job in self.jobs.iter_mut() {
            job.issue(mem)?;
        }
        Ok(())
    }

    /// Clear pending interrupts on every sibling.
    pub fn clear_irq(&mut self) {
        for job in self.jobs.iter_mut() {
            job.clear_irq();
        }
    }

    /// Per-sibling access, for the base-address fix-up after a
    /// broadcast staging pass.
    pub fn job_mut(&mut self, index: usize) -> &mut JobDescriptor {
        &mut self.jobs[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_staging_reaches_all() {
        let mut jobs = vec![JobDescriptor::new(); 3];
        let mut group = BroadcastGroup::new(&mut jobs);
        group
            .stage_loop_nest(1, 1, 1, &[10, 0, 0, 0, 0], &Default::default())
            .unwrap();
        group.stage_cmd(0, 3, 1, 2, true);

        for job in &jobs {
            assert_eq!(job.loop_bounds()[0], 9);
            let word = job.command_word();
            assert_eq!(word & 0xF, 0);
            assert_ne!(word & (1 << 20), 0);
        }
    }

    #[test]
    fn test_issue_all_in_index_order() {
        // two copy-replicate jobs writing to the same cell: the second
        // sibling's value must win
        let mut mem = Scratchpad::new(16);
        mem.store_f32(0, 1.0);
        mem.store_f32(1, 2.0);

        let mut jobs = vec![JobDescriptor::new(); 2];
        let mut group = BroadcastGroup::new(&mut jobs);
        group
            .stage_loop_nest(1, 1, 1, &[1, 0, 0, 0, 0], &Default::default())
            .unwrap();
        group.stage_cmd(8, 0, 0, 1, false);
        group.job_mut(0).stage_agu_offs(0, 0, 8 * 4);
        group.job_mut(1).stage_agu_offs(4, 0, 8 * 4);

        group.issue_all(&mut mem).unwrap();
        assert_eq!(mem.load_f32(8), 2.0);

        for job in &jobs {
            assert!(job.has_irq());
        }
        let mut group = BroadcastGroup::new(&mut jobs);
        group.clear_irq();
        assert!(jobs.iter().all(|j| !j.has_irq()));
    }
}
