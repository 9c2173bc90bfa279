//! In-memory page driver for integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use lens_types::BoundingBox;
use page_port::{
    AxNode, AxSnapshotOptions, DomNode, DomStats, DomWalkOptions, MutationSummary, PageDriver,
    PageError, PageResult, Screenshot,
};

/// Scriptable page: tests mutate the snapshot between observations the way
/// a real page mutates between agent steps.
pub struct MockPage {
    url: Mutex<String>,
    title: String,
    ax: Mutex<AxNode>,
    dom_stats: DomStats,
    interactive_dom: usize,
    canvas_boxes: Vec<BoundingBox>,
    snapshot_delay: Mutex<Option<Duration>>,
    fail_snapshots: Mutex<bool>,
}

impl MockPage {
    pub fn new(url: &str, ax: AxNode) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            title: "Mock page".into(),
            ax: Mutex::new(ax),
            dom_stats: DomStats {
                node_count: 150,
                max_depth: 8,
                avg_children: 2.0,
            },
            interactive_dom: 2,
            canvas_boxes: Vec::new(),
            snapshot_delay: Mutex::new(None),
            fail_snapshots: Mutex::new(false),
        }
    }

    pub fn with_dom_stats(mut self, stats: DomStats, interactive_dom: usize) -> Self {
        self.dom_stats = stats;
        self.interactive_dom = interactive_dom;
        self
    }

    pub fn with_canvas(mut self, boxes: Vec<BoundingBox>) -> Self {
        self.canvas_boxes = boxes;
        self
    }

    pub fn set_ax(&self, ax: AxNode) {
        *self.ax.lock().unwrap() = ax;
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock().unwrap() = url.to_string();
    }

    pub fn set_snapshot_delay(&self, delay: Option<Duration>) {
        *self.snapshot_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_snapshots(&self, fail: bool) {
        *self.fail_snapshots.lock().unwrap() = fail;
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn query_selector_count(&self, selector: &str) -> PageResult<usize> {
        if selector.starts_with("canvas") {
            Ok(if selector.contains("webgl") {
                0
            } else {
                self.canvas_boxes.len()
            })
        } else {
            Ok(self.interactive_dom)
        }
    }

    async fn accessibility_snapshot(&self, _: AxSnapshotOptions) -> PageResult<AxNode> {
        if *self.fail_snapshots.lock().unwrap() {
            return Err(PageError::Gone("tab crashed".into()));
        }
        let delay = *self.snapshot_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.ax.lock().unwrap().clone())
    }

    async fn dom_walk(&self, _: DomWalkOptions) -> PageResult<DomNode> {
        Err(PageError::Unsupported("mock has no DOM walk".into()))
    }

    async fn dom_stats(&self) -> PageResult<DomStats> {
        Ok(self.dom_stats)
    }

    async fn canvas_regions(&self) -> PageResult<Vec<BoundingBox>> {
        Ok(self.canvas_boxes.clone())
    }

    async fn screenshot(&self, clip: Option<BoundingBox>) -> PageResult<Screenshot> {
        let rect = clip.unwrap_or(BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 1280.0,
            height: 720.0,
        });
        Ok(Screenshot {
            data: vec![0xAB; 16],
            rect,
        })
    }

    async fn observe_mutations(&self, _: Duration) -> PageResult<MutationSummary> {
        Ok(MutationSummary::default())
    }

    async fn meta_content(&self, _: &str) -> PageResult<Option<String>> {
        Ok(None)
    }

    async fn title(&self) -> PageResult<String> {
        Ok(self.title.clone())
    }

    fn url(&self) -> String {
        self.url.lock().unwrap().clone()
    }
}

/// Accessibility-node fixture builder.
pub fn ax(role: &str, name: &str, children: Vec<AxNode>) -> AxNode {
    AxNode {
        role: role.into(),
        name: name.into(),
        children,
        ..AxNode::default()
    }
}

pub fn ax_with_value(role: &str, name: &str, value: &str) -> AxNode {
    AxNode {
        role: role.into(),
        name: name.into(),
        value: Some(value.into()),
        ..AxNode::default()
    }
}

pub fn ax_with_flags(role: &str, name: &str, flags: &[&str]) -> AxNode {
    AxNode {
        role: role.into(),
        name: name.into(),
        flags: flags.iter().map(|f| f.to_string()).collect(),
        ..AxNode::default()
    }
}
