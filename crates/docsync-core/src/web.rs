//! Browser adapter: SVG layer, slide iframe bridge and the WASM entry point.

use crate::elements::ElementId;
use crate::layer::RenderSurface;
use crate::viewer::{OutboundViewerMessage, ViewerBridge, ViewerError, ViewerMessage};
use kurbo::Size;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// A mounted `<g>` and the listener that reports the pointer entering it.
#[derive(Clone)]
pub struct MountedGroup {
    group: web_sys::Element,
    _on_enter: Rc<Closure<dyn FnMut(web_sys::Event)>>,
}

impl fmt::Debug for MountedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedGroup")
            .field("id", &self.group.get_attribute("data-annotation"))
            .finish()
    }
}

/// Renders annotation markup into an `<svg>` element. Each element is mounted
/// in its own `<g>`; remote elements get the `remote` class.
pub struct SvgSurface {
    document: web_sys::Document,
    svg: web_sys::Element,
    hovered: Rc<RefCell<Vec<ElementId>>>,
}

impl SvgSurface {
    pub fn new(svg: web_sys::Element) -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self {
            document,
            svg,
            hovered: Rc::default(),
        })
    }

    fn set_attribute(element: &web_sys::Element, name: &str, value: &str) {
        if let Err(e) = element.set_attribute(name, value) {
            log::warn!("Failed to set {}: {:?}", name, e);
        }
    }
}

impl RenderSurface for SvgSurface {
    type Handle = Option<MountedGroup>;

    fn mount(&mut self, id: &ElementId, markup: &str, wrapped: bool) -> Self::Handle {
        let group = match self.document.create_element_ns(Some(SVG_NS), "g") {
            Ok(group) => group,
            Err(e) => {
                log::warn!("Failed to create group for {}: {:?}", id, e);
                return None;
            }
        };
        Self::set_attribute(&group, "data-annotation", &id.to_string());
        if wrapped {
            Self::set_attribute(&group, "class", "remote");
        }
        group.set_inner_html(markup);

        let hovered = self.hovered.clone();
        let entered = id.clone();
        let on_enter = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            hovered.borrow_mut().push(entered.clone());
        });
        if let Err(e) =
            group.add_event_listener_with_callback("pointerenter", on_enter.as_ref().unchecked_ref())
        {
            log::warn!("Failed to listen for hovers on {}: {:?}", id, e);
        }

        if let Err(e) = self.svg.append_child(&group) {
            log::warn!("Failed to mount {}: {:?}", id, e);
            return None;
        }
        Some(MountedGroup {
            group,
            _on_enter: Rc::new(on_enter),
        })
    }

    fn update(&mut self, handle: &Self::Handle, markup: &str) {
        if let Some(mounted) = handle {
            mounted.group.set_inner_html(markup);
        }
    }

    fn unmount(&mut self, handle: &Self::Handle) {
        if let Some(mounted) = handle {
            mounted.group.remove();
        }
    }

    fn set_dimmed(&mut self, handle: &Self::Handle, dimmed: bool) {
        let Some(mounted) = handle else {
            return;
        };
        let result = if dimmed {
            mounted.group.set_attribute("opacity", "0.4")
        } else {
            mounted.group.remove_attribute("opacity")
        };
        if let Err(e) = result {
            log::warn!("Failed to dim element: {:?}", e);
        }
    }

    fn clear(&mut self) {
        self.svg.set_inner_html("");
        self.hovered.borrow_mut().clear();
    }

    fn set_base_size(&mut self, base: Size) {
        let view_box = format!("0 0 {} {}", base.width, base.height);
        Self::set_attribute(&self.svg, "viewBox", &view_box);
    }

    fn take_hovered(&mut self) -> Vec<ElementId> {
        std::mem::take(&mut *self.hovered.borrow_mut())
    }
}

/// Posts navigation keys to the slide viewer iframe.
pub struct IframeBridge {
    iframe: web_sys::HtmlIFrameElement,
    target_origin: String,
}

impl IframeBridge {
    pub fn new(iframe: web_sys::HtmlIFrameElement, target_origin: impl Into<String>) -> Self {
        Self {
            iframe,
            target_origin: target_origin.into(),
        }
    }
}

impl ViewerBridge for IframeBridge {
    fn post(&mut self, message: &OutboundViewerMessage) -> Result<(), ViewerError> {
        let window = self
            .iframe
            .content_window()
            .ok_or_else(|| ViewerError::Unavailable("iframe has no window".into()))?;
        let payload = serde_wasm_bindgen::to_value(message)
            .map_err(|e| ViewerError::Unavailable(e.to_string()))?;
        window
            .post_message(&payload, &self.target_origin)
            .map_err(|e| ViewerError::Unavailable(format!("{:?}", e)))
    }
}

/// Decode a `message` event posted by the viewer. The payload may be an
/// object or its JSON text.
pub fn parse_viewer_event(event: &web_sys::MessageEvent) -> Result<ViewerMessage, ViewerError> {
    let data = event.data();
    if let Some(text) = data.as_string() {
        return ViewerMessage::from_json(&text);
    }
    let value: serde_json::Value = serde_wasm_bindgen::from_value(data)
        .map_err(|e| ViewerError::Unavailable(e.to_string()))?;
    ViewerMessage::from_value(value)
}

/// Collects messages the slide viewer posts to this window. Messages from
/// any other origin are ignored. The host drains them with [`take`] and hands
/// each to `PeerSession::on_viewer_message`.
///
/// [`take`]: ViewerListener::take
pub struct ViewerListener {
    window: web_sys::Window,
    received: Rc<RefCell<Vec<ViewerMessage>>>,
    on_message: Closure<dyn FnMut(web_sys::MessageEvent)>,
}

impl ViewerListener {
    pub fn attach(viewer_origin: impl Into<String>) -> Option<Self> {
        let window = web_sys::window()?;
        let viewer_origin = viewer_origin.into();
        let received: Rc<RefCell<Vec<ViewerMessage>>> = Rc::default();
        let queue = received.clone();
        let on_message =
            Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
                if event.origin() != viewer_origin {
                    return;
                }
                match parse_viewer_event(&event) {
                    Ok(message) => queue.borrow_mut().push(message),
                    Err(e) => log::debug!("Ignoring viewer message: {}", e),
                }
            });
        if let Err(e) =
            window.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())
        {
            log::warn!("Failed to listen for viewer messages: {:?}", e);
            return None;
        }
        Some(Self {
            window,
            received,
            on_message,
        })
    }

    /// Drain received messages in arrival order.
    pub fn take(&self) -> Vec<ViewerMessage> {
        std::mem::take(&mut *self.received.borrow_mut())
    }
}

impl Drop for ViewerListener {
    fn drop(&mut self) {
        let callback = self.on_message.as_ref().unchecked_ref();
        if let Err(e) = self.window.remove_event_listener_with_callback("message", callback) {
            log::warn!("Failed to remove viewer listener: {:?}", e);
        }
    }
}

/// Initialize logging and panic reporting for the WASM module.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();

    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&JsValue::from_str(&format!("Logger already set: {e}")));
    }

    log::info!("DocSync core loaded");
}
