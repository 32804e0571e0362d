use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::error::{ContextError, EffectError, ProgramError};
use crate::program::{ProgramKey, ProgramSpec, ShaderProgram};
use crate::texture::{Texture, TextureId};
use crate::types::ContextConfig;

use super::cache::ProgramCache;
use super::pipeline::{self, PipelineLayouts};
use super::units::TextureUnits;

/// Owns the GPU device plus everything shared between passes: the program
/// registry, the texture unit table, and the common layouts.
///
/// A context is single-threaded; every surface and texture created from it
/// must be used with it alone.
pub struct RenderContext {
    _instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    pub(crate) layouts: PipelineLayouts,
    pub(crate) sampler: wgpu::Sampler,
    pub(crate) placeholder: wgpu::TextureView,
    programs: RefCell<ProgramCache>,
    units: RefCell<TextureUnits>,
    next_texture_id: Cell<u64>,
}

impl RenderContext {
    /// Brings up a headless device. No window or surface is involved.
    pub fn new(config: &ContextConfig) -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power.to_wgpu(),
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        }))?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            is_software = matches!(adapter_info.device_type, wgpu::DeviceType::Cpu),
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(config.label.as_str()),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))?;

        let layouts = PipelineLayouts::new(&device)?;
        let sampler = pipeline::create_sampler(&device);
        let placeholder = pipeline::create_placeholder_view(&device, &queue);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            adapter_info,
            layouts,
            sampler,
            placeholder,
            programs: RefCell::new(ProgramCache::default()),
            units: RefCell::new(TextureUnits::default()),
            next_texture_id: Cell::new(1),
        })
    }

    /// [`RenderContext::new`] with default options.
    pub fn headless() -> Result<Self, ContextError> {
        Self::new(&ContextConfig::default())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Returns the cached program for `key`, compiling it from `build` on
    /// first use. A key is compiled at most once per context.
    pub fn program(
        &self,
        key: ProgramKey,
        build: impl FnOnce() -> ProgramSpec,
    ) -> Result<Rc<ShaderProgram>, ProgramError> {
        if let Some(program) = self.programs.borrow().get(&key) {
            return Ok(program);
        }
        let spec = build();
        debug_assert_eq!(spec.key(), &key, "program spec built under a different key");
        let program = Rc::new(ShaderProgram::compile(self, spec)?);
        tracing::debug!(program = %key, "compiled program");
        Ok(self.programs.borrow_mut().store(key, program))
    }

    pub fn is_cached(&self, key: &ProgramKey) -> bool {
        self.programs.borrow().get(key).is_some()
    }

    pub fn cached_programs(&self) -> usize {
        self.programs.borrow().len()
    }

    /// Binds `texture` to `unit` and returns a guard that releases the unit
    /// when dropped, including on early returns.
    pub fn bind_unit<'a>(
        &'a self,
        texture: &Texture,
        unit: u32,
    ) -> Result<UnitBinding<'a>, EffectError> {
        texture.use_unit(self, unit)?;
        Ok(UnitBinding { ctx: self, unit })
    }

    pub fn bound_unit(&self, id: TextureId) -> Option<u32> {
        self.units.borrow().unit_of(id)
    }

    /// Units currently holding a texture, as `(unit, texture)` pairs.
    pub fn occupied_units(&self) -> Vec<(u32, TextureId)> {
        self.units.borrow().occupied().collect()
    }

    pub(crate) fn release_units(&self, id: TextureId) {
        if let Some(unit) = self.units.borrow_mut().release(id) {
            tracing::trace!(unit, texture = %id, "released texture unit");
        }
    }

    pub(crate) fn units_mut(&self) -> RefMut<'_, TextureUnits> {
        self.units.borrow_mut()
    }

    pub(crate) fn units(&self) -> Ref<'_, TextureUnits> {
        self.units.borrow()
    }

    pub(crate) fn next_texture_id(&self) -> TextureId {
        let id = self.next_texture_id.get();
        self.next_texture_id.set(id + 1);
        TextureId(id)
    }
}

/// Keeps a texture on a unit for the guard's lifetime.
#[must_use = "the unit is released as soon as the binding is dropped"]
pub struct UnitBinding<'a> {
    ctx: &'a RenderContext,
    unit: u32,
}

impl UnitBinding<'_> {
    pub fn unit(&self) -> u32 {
        self.unit
    }
}

impl Drop for UnitBinding<'_> {
    fn drop(&mut self) {
        self.ctx.units_mut().release_unit(self.unit);
    }
}
