//! Capability surface handed to generated scene code, and a headless runtime.
//!
//! Generated code only ever sees four things: the scene graph, the camera,
//! the renderer and the orbit controls. Anything reaching for other globals
//! (network, DOM, module imports) is refused before it runs.

use once_cell::sync::Lazy;
use regex::Regex;

use muse_core::config::Dimensions;

/// 1x1 transparent PNG returned by the headless renderer.
pub const PLACEHOLDER_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

static SCENE_ADD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bscene\s*\.\s*add\s*\(").expect("valid scene.add regex"));

static FORBIDDEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s|\brequire\s*\(|\bfetch\s*\(|\bXMLHttpRequest\b|\bWebSocket\b|\bdocument\s*\.|\bwindow\s*\.|\blocalStorage\b|\beval\s*\(")
        .expect("valid forbidden-global regex")
});

/// Result of running one piece of scene code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneReport {
    /// Objects added to the scene graph.
    pub object_count: u32,
    /// Bounding box of the scene.
    pub size: Dimensions,
}

/// A file produced by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub data: String,
    pub filename: String,
    pub mime_type: String,
    pub binary: bool,
}

/// Scene graph root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    pub object_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: [f64; 3],
    pub target: [f64; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: [6.0, 6.0, 6.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Renderer {
    pub wireframe: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Controls {
    pub auto_rotate: bool,
}

/// Everything generated code may touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub scene: SceneGraph,
    pub camera: Camera,
    pub renderer: Renderer,
    pub controls: Controls,
}

/// Executes scene code against a [`Capabilities`] surface.
///
/// Errors are plain messages: they travel to the host inside an `ERROR`
/// event and never cross the sandbox boundary as typed values.
pub trait SceneRuntime: Send {
    fn run(&mut self, code: &str) -> Result<SceneReport, String>;

    fn reset_camera(&mut self);

    fn set_auto_rotate(&mut self, enabled: bool);

    fn set_wireframe(&mut self, enabled: bool);

    /// Render capture as a `data:image/png;base64,...` URL.
    fn screenshot(&mut self) -> Result<String, String>;

    fn export_obj(&mut self) -> Result<Export, String>;
}

/// Runtime that does a static pass over the code instead of rendering it.
///
/// Every `scene.add(...)` call counts as one object; the scene is assumed to
/// fill the target dimensions it was generated for.
#[derive(Debug)]
pub struct HeadlessRuntime {
    capabilities: Capabilities,
    target: Dimensions,
    last_size: Option<Dimensions>,
}

impl HeadlessRuntime {
    pub fn new(target: Dimensions) -> Self {
        Self {
            capabilities: Capabilities::default(),
            target,
            last_size: None,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}

impl SceneRuntime for HeadlessRuntime {
    fn run(&mut self, code: &str) -> Result<SceneReport, String> {
        if code.trim().is_empty() {
            return Err("No scene code to run".to_string());
        }
        if let Some(found) = FORBIDDEN.find(code) {
            return Err(format!(
                "Scene code uses a capability outside scene, camera, renderer and controls: `{}`",
                found.as_str().trim()
            ));
        }

        let object_count = SCENE_ADD.find_iter(code).count() as u32;
        let size = if object_count > 0 {
            self.target
        } else {
            Dimensions::new(0.0, 0.0, 0.0)
        };

        self.capabilities.scene.object_count = object_count;
        self.last_size = Some(size);
        Ok(SceneReport { object_count, size })
    }

    fn reset_camera(&mut self) {
        self.capabilities.camera = Camera::default();
    }

    fn set_auto_rotate(&mut self, enabled: bool) {
        self.capabilities.controls.auto_rotate = enabled;
    }

    fn set_wireframe(&mut self, enabled: bool) {
        self.capabilities.renderer.wireframe = enabled;
    }

    fn screenshot(&mut self) -> Result<String, String> {
        if self.last_size.is_none() {
            return Err("Nothing has been rendered yet".to_string());
        }
        Ok(format!("data:image/png;base64,{PLACEHOLDER_PNG_BASE64}"))
    }

    fn export_obj(&mut self) -> Result<Export, String> {
        let size = match self.last_size {
            Some(size) if self.capabilities.scene.object_count > 0 => size,
            _ => return Err("No objects to export".to_string()),
        };
        Ok(Export {
            data: bounding_box_obj(size),
            filename: "scene.obj".to_string(),
            mime_type: "text/plain".to_string(),
            binary: false,
        })
    }
}

/// Wavefront OBJ of an axis-aligned box centred on the origin.
fn bounding_box_obj(size: Dimensions) -> String {
    let (hx, hy, hz) = (size.x / 2.0, size.y / 2.0, size.z / 2.0);
    let vertices = [
        [-hx, -hy, -hz],
        [hx, -hy, -hz],
        [hx, hy, -hz],
        [-hx, hy, -hz],
        [-hx, -hy, hz],
        [hx, -hy, hz],
        [hx, hy, hz],
        [-hx, hy, hz],
    ];
    let faces = [
        [1, 2, 3, 4],
        [5, 8, 7, 6],
        [1, 5, 6, 2],
        [2, 6, 7, 3],
        [3, 7, 8, 4],
        [5, 1, 4, 8],
    ];

    let mut out = String::from("# muse scene export\no scene\n");
    for vertex in &vertices {
        out.push_str(&format!("v {} {} {}\n", vertex[0], vertex[1], vertex[2]));
    }
    for face in &faces {
        out.push_str(&format!("f {} {} {} {}\n", face[0], face[1], face[2], face[3]));
    }
    out
}
