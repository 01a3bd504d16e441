//! Ogre mesh XML
//!
//! Unpacking writes one submesh with its own geometry. Packing accepts
//! shared geometry and per-submesh geometry, `triangle_list` faces only,
//! and the first texture coordinate of each vertex. Bone assignments are
//! optional; a vertex without any is bound fully to joint 0.

use rw4_common::{Triangle, Vertex};

use crate::error::ExportError;
use crate::xml::Element;

/// Vertices and triangles of a single-mesh model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

// ============================================================================
// Writing
// ============================================================================

fn vertex_element(v: &Vertex) -> Element {
    Element::new("vertex")
        .child(Element::new("position").xyz(v.position))
        .child(Element::new("normal").xyz(Vertex::unpack_normal(v.normal)))
        .child(Element::new("texcoord").attr("u", v.uv[0]).attr("v", v.uv[1]))
        .child(Element::new("tangent").xyz(Vertex::unpack_normal(v.tangent)))
}

impl MeshGeometry {
    pub fn to_document(&self) -> Element {
        let faces = Element::new("faces")
            .attr("count", self.triangles.len())
            .children(self.triangles.iter().map(|t| {
                Element::new("face")
                    .attr("v1", t.indices[0])
                    .attr("v2", t.indices[1])
                    .attr("v3", t.indices[2])
            }));

        let vertex_buffer = Element::new("vertexbuffer")
            .attr("positions", "true")
            .attr("normals", "true")
            .attr("texture_coords", 1)
            .attr("texture_coord_dimensions_0", 2)
            .attr("tangents", "true")
            .children(self.vertices.iter().map(vertex_element));

        let geometry = Element::new("geometry")
            .attr("vertexcount", self.vertices.len())
            .child(vertex_buffer);

        let assignments = Element::new("boneassignments").children(
            self.vertices.iter().enumerate().flat_map(|(i, v)| {
                v.bone_assignments().map(move |(bone, weight)| {
                    Element::new("vertexboneassignment")
                        .attr("vertexindex", i)
                        .attr("boneindex", bone)
                        .attr("weight", f32::from(weight) / 255.0)
                })
            }),
        );

        Element::new("mesh").child(
            Element::new("submeshes").child(
                Element::new("submesh")
                    .attr("material", "BaseWhite")
                    .attr("usesharedvertices", "false")
                    .child(faces)
                    .child(geometry)
                    .child(assignments),
            ),
        )
    }
}

// ============================================================================
// Reading
// ============================================================================

fn read_xyz(e: &Element) -> Result<[f32; 3], ExportError> {
    Ok([e.parse("x")?, e.parse("y")?, e.parse("z")?])
}

/// Weights in 0..=1 to stored bytes. Each byte is taken from the rounded
/// running total, so the bytes of a vertex add up to the rounded sum.
/// Zero bytes are dropped.
fn weight_bytes(weights: &[(u8, f32)]) -> Vec<(u8, u8)> {
    let mut total = 0.0f32;
    let mut stored = 0u32;
    let mut pairs = Vec::with_capacity(weights.len());
    for &(bone, weight) in weights {
        total += weight.clamp(0.0, 1.0);
        let upto = (total.min(1.0) * 255.0).round() as u32;
        let byte = upto.saturating_sub(stored) as u8;
        stored = upto;
        if byte != 0 {
            pairs.push((bone, byte));
        }
    }
    pairs
}

/// Fill one vertex attribute from every `<vertex>` of every buffer, in order
fn fill<'a>(
    vertices: &mut [Vertex],
    elements: impl Iterator<Item = &'a Element>,
    what: &'static str,
    mut apply: impl FnMut(&mut Vertex, &Element) -> Result<(), ExportError>,
) -> Result<(), ExportError> {
    let mut found = 0;
    for e in elements.take(vertices.len()) {
        apply(&mut vertices[found], e)?;
        found += 1;
    }
    if found != vertices.len() {
        return Err(ExportError::MissingVertexData {
            what,
            found,
            expected: vertices.len(),
        });
    }
    Ok(())
}

fn decode_geometry(geometry: &Element) -> Result<Vec<Vertex>, ExportError> {
    let count: usize = geometry.parse("vertexcount")?;
    let vertex_elements = || {
        geometry
            .elements("vertexbuffer")
            .flat_map(|b| b.elements("vertex"))
    };
    let children = |name: &'static str| vertex_elements().flat_map(move |v| v.elements(name));

    // grown per element; `vertexcount` only bounds it
    let mut vertices = Vec::new();
    for e in children("position").take(count) {
        vertices.push(Vertex {
            position: read_xyz(e)?,
            ..Default::default()
        });
    }
    if vertices.len() != count {
        return Err(ExportError::MissingVertexData {
            what: "position",
            found: vertices.len(),
            expected: count,
        });
    }
    fill(&mut vertices, children("normal"), "normal", |v, e| {
        v.normal = Vertex::pack_normal(read_xyz(e)?);
        Ok(())
    })?;
    fill(&mut vertices, children("tangent"), "tangent", |v, e| {
        v.tangent = Vertex::pack_normal(read_xyz(e)?);
        Ok(())
    })?;
    // only the first texture coordinate of each vertex
    let first_uvs = vertex_elements().filter_map(|v| v.find("texcoord"));
    fill(&mut vertices, first_uvs, "texcoord", |v, e| {
        v.uv = [e.parse("u")?, e.parse("v")?];
        Ok(())
    })?;

    for v in &mut vertices {
        v.set_bone_assignments(&[(0, 255)]);
    }
    Ok(vertices)
}

/// Apply the `<vertexboneassignment>`s of one geometry block
fn apply_bone_assignments(
    vertices: &mut [Vertex],
    assignments: Option<&Element>,
) -> Result<(), ExportError> {
    let Some(assignments) = assignments else {
        return Ok(());
    };
    let mut per_vertex: Vec<Vec<(u8, f32)>> = vec![Vec::new(); vertices.len()];
    for a in assignments.elements("vertexboneassignment") {
        let index: usize = a.parse("vertexindex")?;
        let bone: u8 = a.parse("boneindex")?;
        let weight: f32 = a.parse("weight")?;
        let slot = per_vertex
            .get_mut(index)
            .ok_or_else(|| ExportError::InvalidAttribute {
                element: a.name.clone(),
                attribute: "vertexindex".to_string(),
                value: index.to_string(),
            })?;
        slot.push((bone, weight));
    }
    for (vertex, weights) in vertices.iter_mut().zip(per_vertex) {
        let pairs = weight_bytes(&weights);
        if !pairs.is_empty() {
            vertex.set_bone_assignments(&pairs);
        }
    }
    Ok(())
}

impl MeshGeometry {
    /// Read the geometry of an Ogre `<mesh>` document
    pub fn from_document(mesh: &Element) -> Result<Self, ExportError> {
        let mut geometry = Self::default();

        let mut shared_count = 0;
        if let Some(shared) = mesh.find("sharedgeometry") {
            geometry.vertices = decode_geometry(shared)?;
            shared_count = geometry.vertices.len();
            apply_bone_assignments(&mut geometry.vertices, mesh.find("boneassignments"))?;
        }

        for submesh in mesh.find_required("submeshes")?.elements("submesh") {
            if let Some(op) = submesh.get("operationtype")
                && op != "triangle_list"
            {
                return Err(ExportError::UnsupportedOperation(op.to_string()));
            }

            let first_vertex = if submesh.get("usesharedvertices") == Some("true") {
                0
            } else {
                geometry.vertices.len() as u32
            };

            for face in submesh.find_required("faces")?.elements("face") {
                let mut indices = [0u16; 3];
                for (index, key) in indices.iter_mut().zip(["v1", "v2", "v3"]) {
                    let v = first_vertex + face.parse::<u32>(key)?;
                    *index = u16::try_from(v).map_err(|_| ExportError::IndexOverflow(v))?;
                }
                geometry.triangles.push(Triangle { indices });
            }

            if let Some(own) = submesh.find("geometry") {
                let mut vertices = decode_geometry(own)?;
                apply_bone_assignments(&mut vertices, submesh.find("boneassignments"))?;
                geometry.vertices.extend(vertices);
            }
        }

        tracing::debug!(
            shared = shared_count,
            vertices = geometry.vertices.len(),
            triangles = geometry.triangles.len(),
            "read mesh document"
        );
        Ok(geometry)
    }
}
