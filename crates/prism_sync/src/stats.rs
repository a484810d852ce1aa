use std::fmt;

/// Summary of the synchronized scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    /// Nodes represented by at least one shape.
    pub nodes: usize,
    /// Backend shapes, instances included.
    pub shapes: usize,
    pub instances: usize,
    pub faces: usize,
    pub emissive_materials: usize,
    pub shadow_catchers: usize,
}

impl fmt::Display for SceneStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} node(s), {} shape(s) ({} instanced), {} face(s), {} emissive material(s)",
            self.nodes, self.shapes, self.instances, self.faces, self.emissive_materials
        )?;
        if self.shadow_catchers > 0 {
            write!(f, ", {} shadow catcher(s)", self.shadow_catchers)?;
        }
        Ok(())
    }
}
