use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use lens_types::{BoundingBox, Role, Signals};
use page_port::{AxNode, AxSnapshotOptions, PageDriver};

use crate::cache::SignalCache;
use crate::errors::Result;
use crate::kind;

/// Selector matching elements an agent can act on; the denominator of the
/// a11y coverage ratio.
pub const INTERACTIVE_SELECTOR: &str = "a[href], button, input, select, textarea, \
     [role='button'], [role='link'], [role='checkbox'], [role='radio'], \
     [role='combobox'], [role='listbox'], [role='menuitem'], [role='tab'], \
     [role='switch']";

const CANVAS_SELECTOR: &str = "canvas, [data-canvas]";
const WEBGL_SELECTOR: &str = "canvas[data-webgl], canvas[data-context~='webgl']";

/// Depth cap for the coverage snapshot; the full tree is not needed to
/// count interactive nodes on any realistic page.
const COVERAGE_SNAPSHOT_DEPTH: usize = 24;

#[derive(Clone, Copy, Debug)]
pub struct ProbeOptions {
    /// Run the 500 ms mutation sample when no fresh cache entry exists.
    pub dynamic_probe: bool,
    pub mutation_window: Duration,
    /// Skip the cache and recompute (the orchestrator forces this on
    /// origin change).
    pub force: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            dynamic_probe: false,
            mutation_window: Duration::from_millis(500),
            force: false,
        }
    }
}

/// Collects the cheap structural signals feeding the router.
///
/// Each individual probe failure is caught and replaced with a conservative
/// default, biasing the router toward richer representations instead of
/// failing the observation.
pub struct SignalProbe;

impl SignalProbe {
    pub async fn collect(
        page: &dyn PageDriver,
        cache: &SignalCache,
        options: ProbeOptions,
    ) -> Result<Signals> {
        let url = page.url();
        let origin = origin_of(&url);

        if !options.force {
            if let Some(mut cached) = cache.get(&origin) {
                debug!(%origin, "signal cache hit");
                // The URL may have changed within the same origin.
                cached.url = url;
                return Ok(cached);
            }
        }

        let mut signals = Signals::conservative(url.clone(), origin.clone());

        match page.query_selector_count(CANVAS_SELECTOR).await {
            Ok(n) => signals.has_canvas = n > 0,
            Err(err) => warn!(%err, "canvas probe failed; assuming canvas present"),
        }
        match page.query_selector_count(WEBGL_SELECTOR).await {
            Ok(n) => signals.has_webgl = n > 0,
            Err(err) => warn!(%err, "webgl probe failed"),
        }
        if signals.has_canvas {
            match page.canvas_regions().await {
                Ok(regions) => signals.canvas_regions = non_empty_regions(regions),
                Err(err) => warn!(%err, "canvas region probe failed"),
            }
        }

        match page.dom_stats().await {
            Ok(stats) => {
                signals.dom_node_count = stats.node_count;
                signals.dom_max_depth = stats.max_depth;
                signals.dom_avg_children = stats.avg_children;
            }
            Err(err) => warn!(%err, "dom stats probe failed; keeping conservative defaults"),
        }

        match page.query_selector_count(INTERACTIVE_SELECTOR).await {
            Ok(dom_interactive) => {
                signals.a11y_coverage = Self::coverage(page, dom_interactive).await;
            }
            Err(err) => warn!(%err, "interactive element count failed; assuming zero coverage"),
        }

        if options.dynamic_probe {
            match page.observe_mutations(options.mutation_window).await {
                Ok(summary) if summary.total_mutations > 0 => {
                    signals.dynamic_ratio = Some(
                        summary.interactive_mutations as f64 / summary.total_mutations as f64,
                    );
                }
                Ok(_) => signals.dynamic_ratio = Some(0.0),
                Err(err) => warn!(%err, "mutation sample failed"),
            }
        }

        let og_type = page.meta_content("og:type").await.unwrap_or(None);
        signals.page_kind = kind::classify(&path_of(&url), og_type.as_deref());

        debug!(
            origin = %signals.url_origin,
            coverage = signals.a11y_coverage,
            dom_nodes = signals.dom_node_count,
            has_canvas = signals.has_canvas,
            page_kind = ?signals.page_kind,
            "collected page signals"
        );

        cache.put(origin, signals.clone());
        Ok(signals)
    }

    /// `min(1, a11y_interactive / max(1, dom_interactive))`.
    async fn coverage(page: &dyn PageDriver, dom_interactive: usize) -> f64 {
        let snapshot = match page
            .accessibility_snapshot(AxSnapshotOptions {
                max_depth: Some(COVERAGE_SNAPSHOT_DEPTH),
            })
            .await
        {
            Ok(root) => root,
            Err(err) => {
                warn!(%err, "a11y coverage probe failed; assuming zero coverage");
                return 0.0;
            }
        };
        let a11y_interactive = count_interactive(&snapshot);
        (a11y_interactive as f64 / dom_interactive.max(1) as f64).min(1.0)
    }
}

fn count_interactive(node: &AxNode) -> usize {
    let own = usize::from(Role::parse(&node.role).is_interactive());
    own + node.children.iter().map(count_interactive).sum::<usize>()
}

fn non_empty_regions(regions: Vec<BoundingBox>) -> Vec<BoundingBox> {
    regions
        .into_iter()
        .filter(|r| r.width > 0.0 && r.height > 0.0)
        .collect()
}

/// `scheme://host[:port]` of a URL; the raw string when parsing fails
/// (still a usable cache key).
pub fn origin_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let mut origin = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""));
            if let Some(port) = parsed.port() {
                origin.push_str(&format!(":{port}"));
            }
            origin
        }
        Err(_) => url.to_string(),
    }
}

fn path_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use page_port::{DomNode, DomStats, DomWalkOptions, MutationSummary, PageError, PageResult, Screenshot};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubPage {
        url: String,
        canvas_count: usize,
        dom_stats: PageResult<DomStats>,
        ax: AxNode,
        probe_calls: AtomicUsize,
        mutations: Option<MutationSummary>,
    }

    impl StubPage {
        fn simple(url: &str) -> Self {
            Self {
                url: url.to_string(),
                canvas_count: 0,
                dom_stats: Ok(DomStats {
                    node_count: 120,
                    max_depth: 9,
                    avg_children: 2.4,
                }),
                ax: AxNode {
                    role: "document".into(),
                    children: vec![
                        AxNode {
                            role: "button".into(),
                            name: "Go".into(),
                            ..AxNode::default()
                        },
                        AxNode {
                            role: "textbox".into(),
                            name: "Search".into(),
                            ..AxNode::default()
                        },
                    ],
                    ..AxNode::default()
                },
                probe_calls: AtomicUsize::new(0),
                mutations: None,
            }
        }
    }

    #[async_trait]
    impl PageDriver for StubPage {
        async fn query_selector_count(&self, selector: &str) -> PageResult<usize> {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            if selector.starts_with("canvas") {
                Ok(self.canvas_count)
            } else {
                Ok(4)
            }
        }

        async fn accessibility_snapshot(&self, _: AxSnapshotOptions) -> PageResult<AxNode> {
            Ok(self.ax.clone())
        }

        async fn dom_walk(&self, _: DomWalkOptions) -> PageResult<DomNode> {
            Err(PageError::Unsupported("not needed".into()))
        }

        async fn dom_stats(&self) -> PageResult<DomStats> {
            match &self.dom_stats {
                Ok(stats) => Ok(*stats),
                Err(_) => Err(PageError::driver("stats failed")),
            }
        }

        async fn canvas_regions(&self) -> PageResult<Vec<BoundingBox>> {
            Ok(vec![BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 300.0,
                height: 150.0,
            }])
        }

        async fn screenshot(&self, _: Option<BoundingBox>) -> PageResult<Screenshot> {
            Err(PageError::Unsupported("not needed".into()))
        }

        async fn observe_mutations(&self, _: Duration) -> PageResult<MutationSummary> {
            self.mutations
                .ok_or_else(|| PageError::driver("observer failed"))
        }

        async fn meta_content(&self, _: &str) -> PageResult<Option<String>> {
            Ok(None)
        }

        async fn title(&self) -> PageResult<String> {
            Ok("stub".into())
        }

        fn url(&self) -> String {
            self.url.clone()
        }
    }

    #[tokio::test]
    async fn collects_and_caches_per_origin() {
        let cache = SignalCache::new(Duration::from_secs(60), 8);
        let page = StubPage::simple("https://shop.test/search?q=x");

        let signals = SignalProbe::collect(&page, &cache, ProbeOptions::default())
            .await
            .unwrap();
        assert!(!signals.has_canvas);
        assert_eq!(signals.dom_node_count, 120);
        assert_eq!(signals.a11y_coverage, 0.5);
        assert_eq!(signals.page_kind, lens_types::PageKind::Listing);
        assert_eq!(signals.url_origin, "https://shop.test");
        assert!(signals.dynamic_ratio.is_none());

        let calls_after_first = page.probe_calls.load(Ordering::SeqCst);
        let again = SignalProbe::collect(&page, &cache, ProbeOptions::default())
            .await
            .unwrap();
        assert_eq!(again.dom_node_count, 120);
        // Second collection is a cache hit; no further selector sweeps.
        assert_eq!(page.probe_calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn failed_stats_probe_degrades_conservatively() {
        let cache = SignalCache::new(Duration::from_secs(60), 8);
        let mut page = StubPage::simple("https://broken.test/");
        page.dom_stats = Err(PageError::driver("boom"));

        let signals = SignalProbe::collect(&page, &cache, ProbeOptions::default())
            .await
            .unwrap();
        assert_eq!(signals.dom_node_count, usize::MAX);
        // Coverage is an independent probe and still succeeds here.
        assert_eq!(signals.a11y_coverage, 0.5);
    }

    #[tokio::test]
    async fn dynamic_probe_computes_ratio() {
        let cache = SignalCache::new(Duration::from_secs(60), 8);
        let mut page = StubPage::simple("https://live.test/");
        page.mutations = Some(MutationSummary {
            total_mutations: 10,
            interactive_mutations: 3,
        });

        let options = ProbeOptions {
            dynamic_probe: true,
            ..ProbeOptions::default()
        };
        let signals = SignalProbe::collect(&page, &cache, options).await.unwrap();
        assert_eq!(signals.dynamic_ratio, Some(0.3));
    }

    #[tokio::test]
    async fn force_bypasses_cache() {
        let cache = SignalCache::new(Duration::from_secs(60), 8);
        let page = StubPage::simple("https://shop.test/");
        SignalProbe::collect(&page, &cache, ProbeOptions::default())
            .await
            .unwrap();
        let before = page.probe_calls.load(Ordering::SeqCst);
        let options = ProbeOptions {
            force: true,
            ..ProbeOptions::default()
        };
        SignalProbe::collect(&page, &cache, options).await.unwrap();
        assert!(page.probe_calls.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn origin_normalization() {
        assert_eq!(origin_of("https://a.test:8443/x/y"), "https://a.test:8443");
        assert_eq!(origin_of("https://a.test/x"), "https://a.test");
        assert_eq!(origin_of("not a url"), "not a url");
    }
}
