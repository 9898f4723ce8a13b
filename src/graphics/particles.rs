//! The particle store and the two compute kernels that write it.

use glam::Vec2;

use crate::constants::WORK_GROUP_SIZE;
use crate::shaders::particles_shader as compute_shader;

/// Bytes per particle in each of the two storage buffers.
const PARTICLE_STRIDE: u64 = size_of::<[f32; 4]>() as u64;

/// Everything about one allocation of the store except the buffers themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    count: u32,
    /// Which allocation this is. Only ever grows.
    epoch: u64,
    /// Odd salts for the spawn hashes, drawn once per allocation.
    salts: [u32; 4],
    /// World position particle x/y are relative to as of the last dispatch.
    origin: Vec2,
    /// Origin the next dispatch moves the particles to.
    next_origin: Vec2,
    spawned: bool,
}

impl Allocation {
    pub fn new(count: u32, epoch: u64, origin: Vec2) -> Self {
        Self {
            count,
            epoch,
            salts: std::array::from_fn(|_| rand::random::<u32>() | 1),
            origin,
            next_origin: origin,
            spawned: false,
        }
    }

    /// The allocation that replaces this one if `count` particles are wanted. `None` while
    /// the count is unchanged: nothing else ever triggers a rebuild.
    pub fn resized(&self, count: u32, origin: Vec2) -> Option<Self> {
        (count != self.count).then(|| Self::new(count, self.epoch + 1, origin))
    }

    /// Makes `center` the origin of the next dispatch and returns how far the particles
    /// have to move to stay put in the world. Before the first spawn there is nothing to move.
    pub fn rebase(&mut self, center: Vec2) -> Vec2 {
        self.next_origin = center;
        if self.spawned {
            center - self.origin
        } else {
            Vec2::ZERO
        }
    }

    /// Records one dispatch. Returns whether it has to run the spawn kernel, which is true
    /// exactly once per allocation.
    pub fn advance(&mut self) -> bool {
        self.origin = self.next_origin;
        !std::mem::replace(&mut self.spawned, true)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn salts(&self) -> [u32; 4] {
        self.salts
    }

    /// The origin uniforms for the next dispatch are built against.
    pub fn origin(&self) -> Vec2 {
        self.next_origin
    }

    pub fn workgroups(&self) -> u32 {
        self.count.div_ceil(WORK_GROUP_SIZE)
    }
}

/// Two parallel storage buffers of particles. Never resized or reused; a new density gets a
/// new store with fresh buffers.
pub struct ParticleStore {
    allocation: Allocation,

    positions: wgpu::Buffer,
    velocity_seeds: wgpu::Buffer,
}

impl ParticleStore {
    pub fn new(device: &wgpu::Device, allocation: Allocation) -> Self {
        let buffer = |name: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{name}_buffer")),
                size: allocation.count.max(1) as u64 * PARTICLE_STRIDE,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        };
        // Both buffers are filled by the spawn kernel; nothing is uploaded from here.
        let positions = buffer("positions");
        let velocity_seeds = buffer("velocity_seeds");

        log::debug!(
            "Allocated particle store #{} with {} particles, salts {:08x?}",
            allocation.epoch,
            allocation.count,
            allocation.salts
        );

        Self {
            allocation,
            positions,
            velocity_seeds,
        }
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    pub fn allocation_mut(&mut self) -> &mut Allocation {
        &mut self.allocation
    }

    pub fn count(&self) -> u32 {
        self.allocation.count
    }

    pub fn positions(&self) -> &wgpu::Buffer {
        &self.positions
    }

    pub fn velocity_seeds(&self) -> &wgpu::Buffer {
        &self.velocity_seeds
    }

}

impl Drop for ParticleStore {
    fn drop(&mut self) {
        self.positions.destroy();
        self.velocity_seeds.destroy();
    }
}

/// Spawn + update pipelines. The pipelines outlive any one store; the state bind group is
/// rebuilt whenever the store is.
pub struct Kernels {
    sim_params_buffer: wgpu::Buffer,

    params_bind_group: compute_shader::bind_groups::BindGroup0,
    state_bind_group: compute_shader::bind_groups::BindGroup1,

    spawn_pipeline: wgpu::ComputePipeline,
    update_pipeline: wgpu::ComputePipeline,
}

impl Kernels {
    pub fn new(device: &wgpu::Device, store: &ParticleStore) -> Self {
        let sim_params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sim_params_buffer"),
            size: size_of::<compute_shader::SimParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // New sim params are written every frame

        let params_bind_group = compute_shader::bind_groups::BindGroup0::from_bindings(
            device,
            compute_shader::bind_groups::BindGroupLayout0 {
                params: sim_params_buffer.as_entire_buffer_binding(),
            },
        );
        let state_bind_group = Self::state_bind_group(device, store);

        let spawn_pipeline = compute_shader::compute::create_cs_spawn_pipeline(device);
        let update_pipeline = compute_shader::compute::create_cs_update_pipeline(device);

        Self {
            sim_params_buffer,
            params_bind_group,
            state_bind_group,
            spawn_pipeline,
            update_pipeline,
        }
    }

    fn state_bind_group(
        device: &wgpu::Device,
        store: &ParticleStore,
    ) -> compute_shader::bind_groups::BindGroup1 {
        compute_shader::bind_groups::BindGroup1::from_bindings(
            device,
            compute_shader::bind_groups::BindGroupLayout1 {
                positions: store.positions().as_entire_buffer_binding(),
                velocity_seeds: store.velocity_seeds().as_entire_buffer_binding(),
            },
        )
    }

    /// Points the kernels at a freshly allocated store.
    pub fn rebind(&mut self, device: &wgpu::Device, store: &ParticleStore) {
        self.state_bind_group = Self::state_bind_group(device, store);
    }

    pub fn set_params(&self, queue: &wgpu::Queue, params: &compute_shader::SimParams) {
        queue.write_buffer(&self.sim_params_buffer, 0, bytemuck::bytes_of(params));
    }

    /// Spawns every particle (if asked to) and then advances every particle by one frame.
    pub fn compute_pass(
        &self,
        compute_pass: &mut wgpu::ComputePass,
        store: &ParticleStore,
        spawn: bool,
    ) {
        let workgroups = store.allocation().workgroups();
        if workgroups == 0 {
            return;
        }

        self.params_bind_group.set(compute_pass);
        self.state_bind_group.set(compute_pass);

        if spawn {
            compute_pass.set_pipeline(&self.spawn_pipeline);
            compute_pass.dispatch_workgroups(workgroups, 1, 1);
        }

        compute_pass.set_pipeline(&self.update_pipeline);
        // bind groups are the same
        compute_pass.dispatch_workgroups(workgroups, 1, 1);
    }

    pub fn destroy(&self) {
        self.sim_params_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_slots_are_vec4_sized() {
        assert_eq!(PARTICLE_STRIDE, 16);
    }

    #[test]
    fn sim_params_match_the_wgsl_layout() {
        assert_eq!(size_of::<compute_shader::SimParams>(), 64);
    }

    #[test]
    fn spawn_runs_once_per_allocation() {
        let mut allocation = Allocation::new(5_000, 0, Vec2::ZERO);
        assert!(allocation.advance());
        for _ in 0..10 {
            assert!(!allocation.advance());
        }

        let mut next = allocation.resized(6_000, Vec2::ZERO).unwrap();
        assert!(next.advance());
        assert!(!next.advance());
    }

    #[test]
    fn only_a_new_count_rebuilds() {
        let mut allocation = Allocation::new(5_000, 3, glam::vec2(0.2, 0.4));
        assert!(allocation.advance());
        // Camera movement alone never rebuilds.
        assert_eq!(allocation.resized(5_000, glam::vec2(0.9, 0.1)), None);

        let next = allocation.resized(12_000, glam::vec2(0.9, 0.1)).unwrap();
        assert_eq!(next.count(), 12_000);
        assert_eq!(next.epoch(), 4);
        assert_eq!(next.origin(), glam::vec2(0.9, 0.1));
        assert_eq!(next.workgroups(), 12_000u32.div_ceil(WORK_GROUP_SIZE));
        assert!(next.salts().iter().all(|salt| salt % 2 == 1));
        // Shrinking is a rebuild too.
        assert_eq!(next.resized(5_000, Vec2::ZERO).unwrap().epoch(), 5);
    }

    #[test]
    fn particles_are_not_shifted_before_they_spawn() {
        let mut allocation = Allocation::new(100, 0, Vec2::ZERO);
        assert_eq!(allocation.rebase(glam::vec2(0.7, 0.6)), Vec2::ZERO);
        assert_eq!(allocation.origin(), glam::vec2(0.7, 0.6));
        assert!(allocation.advance());

        let shift = allocation.rebase(glam::vec2(0.7, 0.6 + 2e-7));
        assert_eq!(shift, glam::vec2(0.0, (0.6 + 2e-7) - 0.6));
    }

    #[test]
    fn shifts_add_up_until_dispatched() {
        let mut allocation = Allocation::new(100, 0, glam::vec2(0.5, 0.5));
        assert!(allocation.advance());

        // Two camera snapshots before the next dispatch: the second shift covers both.
        allocation.rebase(glam::vec2(0.5, 0.501));
        let shift = allocation.rebase(glam::vec2(0.5, 0.502));
        assert_eq!(shift, glam::vec2(0.0, 0.502 - 0.5));
        assert!(!allocation.advance());

        let shift = allocation.rebase(glam::vec2(0.5, 0.502));
        assert_eq!(shift, Vec2::ZERO);
    }
}
