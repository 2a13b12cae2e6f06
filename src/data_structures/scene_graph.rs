//! Scene graph and hierarchical scene organization.
//!
//! A loaded model is a tree of [`SceneNode`] trait objects. [`ContainerNode`]s
//! carry a local transform and children (glTF nodes), [`MeshNode`]s are the
//! leaves (one per glTF triangle primitive) and own everything that is needed
//! to draw and pick that primitive: CPU geometry, its pick id, its emissive
//! colour and, once uploaded, its GPU buffers.
//!
//! [`SceneGraph`] wraps the tree in a root container positioned by the model
//! configuration and owns the scene's materials.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix};
use log::warn;
use wgpu::util::DeviceExt;

use crate::{
    camera::Ray,
    config::ModelConfig,
    data_structures::{
        colour::Rgb,
        instance::{Instance, InstanceRaw},
        model::{AlphaMode, Material, Mesh, ModelVertex},
    },
    highlight::Emissive,
    pick::{self, Aabb, Intersection},
    render::{Drawable, Render},
    resources::{MaterialData, NodeData, PrimitiveData, SceneData, texture::load_materials},
};

pub trait SceneNode: std::fmt::Debug {
    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    /// Recompute this node's world transform from its parent's and pass it on.
    fn update_world_transforms(&mut self, parent: &Matrix4<f32>);

    /// Push the nearest hit of every mesh in this subtree onto `hits`.
    fn raycast(&self, ray: &Ray, hits: &mut Vec<Intersection>) {
        for child in self.get_children() {
            child.raycast(ray, hits);
        }
    }

    fn find_mesh(&self, id: u32) -> Option<&MeshNode> {
        self.get_children().iter().find_map(|child| child.find_mesh(id))
    }

    fn find_mesh_mut(&mut self, id: u32) -> Option<&mut MeshNode> {
        self.get_children_mut()
            .iter_mut()
            .find_map(|child| child.find_mesh_mut(id))
    }

    fn upload(&mut self, device: &wgpu::Device) {
        for child in self.get_children_mut() {
            child.upload(device);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        for child in self.get_children_mut() {
            child.write_to_buffers(queue);
        }
    }

    fn get_render<'a>(&'a self, materials: &'a [Material]) -> Render<'a> {
        Render::Composed(
            self.get_children()
                .iter()
                .map(|child| child.get_render(materials))
                .collect(),
        )
    }
}

#[derive(Debug)]
pub struct ContainerNode {
    pub name: Option<String>,
    pub children: Vec<Box<dyn SceneNode>>,
    local: Instance,
    world: Matrix4<f32>,
}

impl ContainerNode {
    pub fn new(name: Option<String>, local: Instance) -> Self {
        Self {
            name,
            children: Vec::new(),
            local,
            world: local.to_matrix(),
        }
    }

    /// Takes effect on the next [`SceneNode::update_world_transforms`].
    pub fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    pub fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }
}

impl SceneNode for ContainerNode {
    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn update_world_transforms(&mut self, parent: &Matrix4<f32>) {
        self.world = *parent * self.local.to_matrix();
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }
}

/// GPU side of a [`MeshNode`], created by [`SceneNode::upload`].
#[derive(Debug)]
struct MeshBuffers {
    mesh: Mesh,
    instance_buffer: wgpu::Buffer,
}

/// One glTF primitive. The mesh node sits below the container of the glTF
/// node that references it and has no transform of its own.
#[derive(Debug)]
pub struct MeshNode {
    pub id: u32,
    pub name: String,
    /// Index into the scene's materials
    pub material: usize,
    vertices: Vec<ModelVertex>,
    indices: Vec<u32>,
    bounds: Option<Aabb>,
    material_double_sided: bool,
    emissive: Rgb,
    world: Matrix4<f32>,
    /// World to mesh-local, `None` for degenerate (zero scale) transforms
    inverse_world: Option<Matrix4<f32>>,
    world_centre: Point3<f32>,
    children: Vec<Box<dyn SceneNode>>,
    buffers: Option<MeshBuffers>,
    dirty: bool,
}

impl MeshNode {
    pub fn new(id: u32, primitive: PrimitiveData, material: &MaterialData) -> Self {
        let PrimitiveData {
            name,
            vertices,
            indices,
            material: material_index,
        } = primitive;
        let bounds = Aabb::from_points(vertices.iter().map(|v| Point3::from(v.position)));
        Self {
            id,
            name,
            material: material_index,
            vertices,
            indices,
            bounds,
            material_double_sided: material.double_sided,
            emissive: material.emissive,
            world: Matrix4::identity(),
            inverse_world: Some(Matrix4::identity()),
            world_centre: bounds.map_or(Point3::origin(), |b| b.centre()),
            children: Vec::new(),
            buffers: None,
            dirty: true,
        }
    }

    pub fn emissive(&self) -> Rgb {
        self.emissive
    }

    pub fn set_emissive(&mut self, colour: Rgb) {
        if self.emissive != colour {
            self.emissive = colour;
            self.dirty = true;
        }
    }

    pub fn is_double_sided(&self) -> bool {
        self.material_double_sided
    }

    /// A negative determinant turns counter-clockwise triangles clockwise on
    /// screen. Picking works in mesh-local space and is unaffected.
    pub fn is_mirrored(&self) -> bool {
        self.world.determinant() < 0.0
    }

    /// Centre of the world space bounding box, used to sort transparent meshes.
    pub fn world_centre(&self) -> Point3<f32> {
        self.world_centre
    }

    pub fn is_uploaded(&self) -> bool {
        self.buffers.is_some()
    }

    /// Nearest hit of `ray` (in world space) on this mesh.
    pub fn intersect(&self, ray: &Ray) -> Option<Intersection> {
        let inverse = self.inverse_world?;
        let bounds = self.bounds?;
        let local_ray = ray.transform(&inverse);
        if !bounds.intersects(&local_ray) {
            return None;
        }
        let cull_back_faces = !self.is_double_sided();

        let nearest = self
            .indices
            .chunks_exact(3)
            .filter_map(|triangle| {
                let corner = |i: u32| Point3::from(self.vertices[i as usize].position);
                pick::intersect_triangle(
                    &local_ray,
                    [corner(triangle[0]), corner(triangle[1]), corner(triangle[2])],
                    cull_back_faces,
                )
            })
            .min_by(f32::total_cmp)?;

        // Local distances are stretched by the node's scale, measure again in world space
        let point = Point3::from_homogeneous(self.world * local_ray.at(nearest).to_homogeneous());
        Some(Intersection {
            distance: (point - ray.origin).magnitude(),
            point,
            id: self.id,
        })
    }

    fn instance_raw(&self) -> InstanceRaw {
        InstanceRaw::new(self.world, self.emissive)
    }
}

impl SceneNode for MeshNode {
    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn update_world_transforms(&mut self, parent: &Matrix4<f32>) {
        self.world = *parent;
        self.inverse_world = self.world.invert();
        self.world_centre = self
            .bounds
            .and_then(|bounds| {
                Aabb::from_points(
                    bounds
                        .corners()
                        .iter()
                        .map(|corner| Point3::from_homogeneous(self.world * corner.to_homogeneous())),
                )
            })
            .map_or_else(|| Point3::from_vec(self.world.w.truncate()), |b| b.centre());
        self.dirty = true;
    }

    fn raycast(&self, ray: &Ray, hits: &mut Vec<Intersection>) {
        hits.extend(self.intersect(ray));
    }

    fn find_mesh(&self, id: u32) -> Option<&MeshNode> {
        (self.id == id).then_some(self)
    }

    fn find_mesh_mut(&mut self, id: u32) -> Option<&mut MeshNode> {
        (self.id == id).then_some(self)
    }

    fn upload(&mut self, device: &wgpu::Device) {
        if self.indices.is_empty() {
            warn!("Mesh {} has no triangles, it won't be drawn", self.name);
            return;
        }
        let mesh = Mesh::new(device, &self.name, &self.vertices, &self.indices);
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Instance Buffer", self.name)),
            contents: bytemuck::cast_slice(&[self.instance_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        self.buffers = Some(MeshBuffers {
            mesh,
            instance_buffer,
        });
        self.dirty = false;
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        if !self.dirty {
            return;
        }
        if let Some(buffers) = &self.buffers {
            queue.write_buffer(
                &buffers.instance_buffer,
                0,
                bytemuck::cast_slice(&[self.instance_raw()]),
            );
            self.dirty = false;
        }
    }

    fn get_render<'a>(&'a self, materials: &'a [Material]) -> Render<'a> {
        let Some(buffers) = &self.buffers else {
            return Render::None;
        };
        let Some(material) = materials.get(self.material) else {
            warn!("Mesh {} refers to missing material {}", self.name, self.material);
            return Render::None;
        };
        let drawable = Drawable {
            mesh: &buffers.mesh,
            material,
            instance: &buffers.instance_buffer,
            id: self.id,
            centre: self.world_centre,
            double_sided: self.is_double_sided(),
            mirrored: self.is_mirrored(),
        };
        match material.alpha_mode {
            AlphaMode::Blend => Render::Transparent(drawable),
            AlphaMode::Opaque | AlphaMode::Mask(_) => Render::Default(drawable),
        }
    }
}

/// A loaded model: node tree, materials and the images backing them.
#[derive(Debug)]
pub struct SceneGraph {
    pub name: String,
    root: ContainerNode,
    material_data: Vec<MaterialData>,
    /// Decoded images, dropped once they are on the GPU
    images: Vec<image::DynamicImage>,
    materials: Vec<Material>,
    mesh_count: u32,
}

impl SceneGraph {
    /// Build the node tree on the CPU. Pick ids are handed out depth first,
    /// starting at 0.
    pub fn new(data: SceneData, model: &ModelConfig) -> Self {
        let SceneData {
            name,
            roots,
            materials,
            images,
        } = data;
        let placement = Instance {
            position: model.position.into(),
            scale: model.scale.into(),
            ..Instance::default()
        };
        let mut root = ContainerNode::new(Some(name.clone()), placement);
        let mut next_id = 0;
        for node in roots {
            root.add_child(build_node(node, &materials, &mut next_id));
        }
        root.update_world_transforms(&Matrix4::identity());

        Self {
            name,
            root,
            material_data: materials,
            images,
            materials: Vec::new(),
            mesh_count: next_id,
        }
    }

    /// Create GPU buffers for every mesh and upload the materials.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
    ) -> anyhow::Result<()> {
        self.materials = load_materials(device, queue, material_layout, &self.material_data, &self.images)?;
        self.images = Vec::new();
        self.root.upload(device);
        Ok(())
    }

    pub fn is_uploaded(&self) -> bool {
        self.material_data.len() == self.materials.len()
    }

    pub fn mesh_count(&self) -> u32 {
        self.mesh_count
    }

    pub fn root(&self) -> &ContainerNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ContainerNode {
        &mut self.root
    }

    pub fn update_world_transforms(&mut self) {
        self.root.update_world_transforms(&Matrix4::identity());
    }

    /// Every mesh hit by `ray`, nearest first.
    pub fn raycast(&self, ray: &Ray) -> Vec<Intersection> {
        let mut hits = Vec::new();
        self.root.raycast(ray, &mut hits);
        pick::sort_nearest_first(&mut hits);
        hits
    }

    pub fn mesh(&self, id: u32) -> Option<&MeshNode> {
        self.root.find_mesh(id)
    }

    pub fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        self.root.write_to_buffers(queue);
    }

    pub fn get_render(&self) -> Render<'_> {
        self.root.get_render(&self.materials)
    }
}

impl Emissive for SceneGraph {
    fn emissive(&self, id: u32) -> Option<Rgb> {
        self.root.find_mesh(id).map(MeshNode::emissive)
    }

    fn set_emissive(&mut self, id: u32, colour: Rgb) -> bool {
        match self.root.find_mesh_mut(id) {
            Some(mesh) => {
                mesh.set_emissive(colour);
                true
            }
            None => false,
        }
    }
}

fn build_node(node: NodeData, materials: &[MaterialData], next_id: &mut u32) -> Box<dyn SceneNode> {
    let NodeData {
        name,
        transform,
        primitives,
        children,
    } = node;
    let mut container = ContainerNode::new(name, transform);
    for primitive in primitives {
        let fallback = MaterialData::default();
        let material = materials.get(primitive.material).unwrap_or_else(|| {
            warn!("Primitive {} refers to missing material {}", primitive.name, primitive.material);
            &fallback
        });
        let mesh = MeshNode::new(*next_id, primitive, material);
        *next_id += 1;
        container.add_child(Box::new(mesh));
    }
    for child in children {
        container.add_child(build_node(child, materials, next_id));
    }
    Box::new(container)
}
