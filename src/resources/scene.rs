//! CPU side of a loaded glTF scene.
//!
//! [`parse_document`] turns a glTF document plus its already fetched buffers
//! and decoded images into plain data: nodes, triangle primitives and
//! materials. Nothing in here touches the GPU, so it runs inside the async
//! loader and in tests.

use log::warn;

use crate::{
    data_structures::{
        colour::Rgb,
        instance::Instance,
        model::{AlphaMode, ModelVertex},
    },
    resources::mesh,
};

/// Everything needed to build a [`crate::data_structures::scene_graph::SceneGraph`].
#[derive(Debug, Default)]
pub struct SceneData {
    pub name: String,
    pub roots: Vec<NodeData>,
    pub materials: Vec<MaterialData>,
    /// Decoded images, indexed like the glTF `images` array.
    pub images: Vec<image::DynamicImage>,
}

impl SceneData {
    pub fn primitive_count(&self) -> usize {
        fn count(node: &NodeData) -> usize {
            node.primitives.len() + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }
}

#[derive(Debug, Default)]
pub struct NodeData {
    pub name: Option<String>,
    pub transform: Instance,
    pub primitives: Vec<PrimitiveData>,
    pub children: Vec<NodeData>,
}

#[derive(Debug)]
pub struct PrimitiveData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    /// Index into [`SceneData::materials`]
    pub material: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub base_colour: [f32; 4],
    pub base_colour_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Rgb,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Default for MaterialData {
    /// The glTF default material.
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_colour: [1.0; 4],
            base_colour_texture: None,
            normal_texture: None,
            metallic: 1.0,
            roughness: 1.0,
            emissive: Rgb::BLACK,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}

impl From<&gltf::Material<'_>> for MaterialData {
    fn from(material: &gltf::Material<'_>) -> Self {
        let pbr = material.pbr_metallic_roughness();
        Self {
            name: material.name().unwrap_or("material").to_string(),
            base_colour: pbr.base_color_factor(),
            base_colour_texture: pbr
                .base_color_texture()
                .map(|info| info.texture().source().index()),
            normal_texture: material
                .normal_texture()
                .map(|normal| normal.texture().source().index()),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            emissive: material.emissive_factor().into(),
            alpha_mode: (material.alpha_mode(), material.alpha_cutoff()).into(),
            double_sided: material.double_sided(),
        }
    }
}

/// Build [`SceneData`] from the default scene of `document`, or its first scene
/// if none is marked as default.
///
/// `buffers` must hold the contents of every glTF buffer in order, `images`
/// every decoded image in order.
pub fn parse_document(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    images: Vec<image::DynamicImage>,
    name: &str,
) -> anyhow::Result<SceneData> {
    let referenced = document.images().count();
    if images.len() != referenced {
        anyhow::bail!(
            "{name} references {referenced} images but {} were decoded",
            images.len()
        );
    }
    let mut materials: Vec<MaterialData> = document.materials().map(|m| (&m).into()).collect();
    let mut parser = Parser {
        buffers,
        default_material: materials.len(),
        needs_default_material: false,
    };

    let roots = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().map(|node| parser.node(&node)).collect(),
        None => {
            warn!("{name} contains no scene, nothing to show");
            Vec::new()
        }
    };
    if parser.needs_default_material {
        materials.push(MaterialData::default());
    }

    Ok(SceneData {
        name: name.to_string(),
        roots,
        materials,
        images,
    })
}

struct Parser<'a> {
    buffers: &'a [Vec<u8>],
    default_material: usize,
    needs_default_material: bool,
}

impl Parser<'_> {
    fn node(&mut self, node: &gltf::Node) -> NodeData {
        let primitives = node
            .mesh()
            .map(|mesh| {
                let mesh_name = mesh.name().map_or_else(|| format!("mesh{}", mesh.index()), str::to_string);
                mesh.primitives()
                    .filter_map(|primitive| {
                        let name = format!("{mesh_name}/{}", primitive.index());
                        self.primitive(&primitive, name)
                    })
                    .collect()
            })
            .unwrap_or_default();

        NodeData {
            name: node.name().map(str::to_string),
            transform: Instance::from_decomposed(node.transform().decomposed()),
            primitives,
            children: node.children().map(|child| self.node(&child)).collect(),
        }
    }

    fn primitive(&mut self, primitive: &gltf::Primitive, name: String) -> Option<PrimitiveData> {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!("Skipping primitive {name}: {:?} is not supported, only triangle lists are", primitive.mode());
            return None;
        }
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

        let Some(positions) = reader.read_positions() else {
            warn!("Skipping primitive {name}: it has no positions");
            return None;
        };
        let mut vertices: Vec<ModelVertex> = positions
            .map(|position| ModelVertex {
                position,
                ..Default::default()
            })
            .collect();

        let mut indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };
        if indices.iter().any(|&i| i as usize >= vertices.len()) {
            warn!("Skipping primitive {name}: indices point past its {} vertices", vertices.len());
            return None;
        }
        if indices.len() % 3 != 0 {
            warn!("Primitive {name} has {} indices, dropping the incomplete triangle", indices.len());
            indices.truncate(indices.len() - indices.len() % 3);
        }

        if let Some(tex_coords) = reader.read_tex_coords(0) {
            vertices
                .iter_mut()
                .zip(tex_coords.into_f32())
                .for_each(|(vertex, uv)| vertex.tex_coords = uv);
        }
        let has_normals = match reader.read_normals() {
            Some(normals) => {
                vertices
                    .iter_mut()
                    .zip(normals)
                    .for_each(|(vertex, normal)| vertex.normal = normal);
                true
            }
            None => {
                mesh::compute_normals(&mut vertices, &indices);
                false
            }
        };
        // Supplied tangents only make sense relative to supplied normals
        match reader.read_tangents().filter(|_| has_normals) {
            Some(tangents) => mesh::apply_tangents(&mut vertices, tangents),
            None => mesh::compute_tangents(&mut vertices, &indices),
        }

        let material = primitive.material().index().unwrap_or_else(|| {
            self.needs_default_material = true;
            self.default_material
        });

        Some(PrimitiveData {
            name,
            vertices,
            indices,
            material,
        })
    }
}
