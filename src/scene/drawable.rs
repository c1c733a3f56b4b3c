use glam::{Mat4, Vec3};

/// Host assigned identity of a model or accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawableKind {
    Model,
    Accessory,
}

/// What a drawable is being drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawType {
    #[default]
    Color,
    Edge,
    GroundShadow,
    ShadowMap,
    ScriptExternalColor,
}

/// Read-only view of a model or accessory, consumed by control objects,
/// technique matching and parameter binding.
pub trait Drawable {
    fn id(&self) -> DrawableId;
    fn kind(&self) -> DrawableKind;
    /// File name used by control object lookups, e.g. `miku.pmx`.
    fn file_name(&self) -> &str;
    fn is_visible(&self) -> bool;
    fn world_transform(&self) -> Mat4;

    fn scale_factor(&self) -> f32 {
        1.0
    }

    fn opacity(&self) -> f32 {
        1.0
    }

    /// Euler orientation in radians.
    fn orientation(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn translation(&self) -> Vec3 {
        self.world_transform().w_axis.truncate()
    }

    fn is_add_blend_enabled(&self) -> bool {
        false
    }

    fn vertex_count(&self) -> u32 {
        0
    }

    fn material_count(&self) -> u32 {
        0
    }

    /// World transform of a bone, if the drawable has one by that name.
    fn bone_transform(&self, _name: &str) -> Option<Mat4> {
        None
    }

    fn morph_weight(&self, _name: &str) -> Option<f32> {
        None
    }

    /// Origin of the first bone, used as the drawable position.
    fn origin(&self) -> Vec3 {
        self.translation()
    }
}

/// Plain-data [`Drawable`] for hosts that keep a snapshot per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableState {
    pub id: DrawableId,
    pub kind: DrawableKind,
    pub file_name: String,
    pub visible: bool,
    pub world: Mat4,
    pub scale: f32,
    pub opacity: f32,
    pub orientation: Vec3,
    pub add_blend: bool,
    pub vertex_count: u32,
    pub material_count: u32,
    pub bones: Vec<(String, Mat4)>,
    pub morphs: Vec<(String, f32)>,
}

impl DrawableState {
    #[must_use]
    pub fn new(id: u32, kind: DrawableKind, file_name: &str) -> Self {
        Self {
            id: DrawableId(id),
            kind,
            file_name: file_name.to_string(),
            visible: true,
            world: Mat4::IDENTITY,
            scale: 1.0,
            opacity: 1.0,
            orientation: Vec3::ZERO,
            add_blend: false,
            vertex_count: 0,
            material_count: 1,
            bones: Vec::new(),
            morphs: Vec::new(),
        }
    }
}

impl Drawable for DrawableState {
    fn id(&self) -> DrawableId {
        self.id
    }

    fn kind(&self) -> DrawableKind {
        self.kind
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn world_transform(&self) -> Mat4 {
        self.world
    }

    fn scale_factor(&self) -> f32 {
        self.scale
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn orientation(&self) -> Vec3 {
        self.orientation
    }

    fn is_add_blend_enabled(&self) -> bool {
        self.add_blend
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    fn material_count(&self) -> u32 {
        self.material_count
    }

    fn bone_transform(&self, name: &str) -> Option<Mat4> {
        self.bones
            .iter()
            .find(|(bone, _)| bone == name)
            .map(|(_, transform)| *transform)
    }

    fn morph_weight(&self, name: &str) -> Option<f32> {
        self.morphs
            .iter()
            .find(|(morph, _)| morph == name)
            .map(|(_, weight)| *weight)
    }

    fn origin(&self) -> Vec3 {
        self.bones
            .first()
            .map_or_else(|| self.translation(), |(_, transform)| transform.w_axis.truncate())
    }
}
