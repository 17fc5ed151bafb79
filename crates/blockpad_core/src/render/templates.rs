//! Default bodies for freshly inserted blocks.

use crate::model::block::BlockKind;

const THREE_TEMPLATE: &str = "\
// 3D scene block (module JS)
// Available: scene, camera, renderer, canvas, THREE.
const geometry = new THREE.BoxGeometry(1, 1, 1);
const material = new THREE.MeshStandardMaterial({ color: 0xaaaaaa, metalness: 0.3, roughness: 0.4 });
const cube = new THREE.Mesh(geometry, material);
scene.add(cube);
const light = new THREE.DirectionalLight(0xffffff, 1);
light.position.set(2, 3, 4);
scene.add(light);
camera.position.z = 3;
function animate() {
  requestAnimationFrame(animate);
  cube.rotation.x += 0.01;
  cube.rotation.y += 0.015;
  renderer.render(scene, camera);
}
animate();";

const PYIMAGE_TEMPLATE: &str = "\
# Render script block: draw into `fig` and the host saves it.
import numpy as np
x = np.linspace(0, 2 * np.pi, 200)
ax = fig.add_subplot()
ax.plot(x, np.sin(x))";

const LATEX_TEMPLATE: &str = r"\int_0^1 x^2 \, dx = \frac{1}{3}";

const MAP_TEMPLATE: &str = "\
// Map block: L, map and tileLayer are available.
map.setView([51.505, -0.09], 13);
L.marker([51.505, -0.09]).addTo(map);";

/// Body given to a new block of `kind`; text and outline blocks start empty.
pub fn default_body(kind: &BlockKind) -> &'static str {
    match kind {
        BlockKind::Three => THREE_TEMPLATE,
        BlockKind::PyImage => PYIMAGE_TEMPLATE,
        BlockKind::Latex => LATEX_TEMPLATE,
        BlockKind::Map => MAP_TEMPLATE,
        BlockKind::Text | BlockKind::Toc | BlockKind::Opaque(_) => "",
    }
}
