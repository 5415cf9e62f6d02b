//! Redirecting a capture to an application's full-screen companion window.
//!
//! Slide shows and browsers going full-screen often create a new window and
//! minimize the one the user originally picked. The detector watches the
//! window list and, per application family, nominates the companion window to
//! capture instead.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::capturer::{monotonic_ms, Source, SourceId, WINDOW_ID_NULL};
use crate::environment::{is_window_full_screen, WindowEnvironment};

/// Decides whether `candidate` (second argument) is the full-screen
/// companion of a window titled like the first argument.
pub type TitlePredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Localized window title prefixes PowerPoint uses for the slide-show
/// window.
const POWERPOINT_SLIDE_SHOW_PREFIXES: &[&str] = &[
    "PowerPoint-Bildschirmpräsentation",
    "Προβολή παρουσίασης PowerPoint",
    "PowerPoint スライド ショー",
    "PowerPoint Slide Show",
    "PowerPoint 幻灯片放映",
    "Presentación de PowerPoint",
    "PowerPoint-slideshow",
    "Presentazione di PowerPoint",
    "Prezentácia programu PowerPoint",
    "Apresentação do PowerPoint",
    "PowerPoint-bildspel",
    "Prezentace v aplikaci PowerPoint",
    "PowerPoint 슬라이드 쇼",
    "PowerPoint-lysbildefremvisning",
    "PowerPoint-vetítés",
    "PowerPoint Slayt Gösterisi",
    "Pokaz slajdów programu PowerPoint",
    "PowerPoint 投影片放映",
    "Демонстрация PowerPoint",
    "Diaporama PowerPoint",
    "PowerPoint-diaesitys",
    "Peragaan Slide PowerPoint",
    "PowerPoint-diavoorstelling",
    "การนำเสนอสไลด์ PowerPoint",
    "Apresentação de slides do PowerPoint",
    "הצגת שקופיות של PowerPoint",
    "عرض شرائح في PowerPoint",
];

const DOCUMENT_TITLE_SEPARATOR: &str = " - ";

// PowerPoint editors title their windows "<document> - PowerPoint"; the part
// before the first separator identifies the document.
fn power_point_document(title: &str) -> &str {
    title
        .split(DOCUMENT_TITLE_SEPARATOR)
        .next()
        .unwrap_or(title)
        .trim()
}

// Slide-show windows are titled "<slide show prefix> - <document>", possibly
// with a further " - " suffix: the document is the part strictly between the
// first and last separator, or everything after a lone separator.
fn slide_show_document(title: &str) -> &str {
    let (Some(left), Some(right)) = (
        title.find(DOCUMENT_TITLE_SEPARATOR),
        title.rfind(DOCUMENT_TITLE_SEPARATOR),
    ) else {
        return title.trim();
    };
    let start = left + DOCUMENT_TITLE_SEPARATOR.len();
    let document = if right > start {
        &title[start..right]
    } else {
        &title[start..]
    };
    document.trim()
}

fn slide_show_title_predicate(original_title: &str, candidate_title: &str) -> bool {
    // The documents must match exactly; a containment check would redirect
    // to a slide show of a different document whose name embeds this one.
    let document = power_point_document(original_title);
    if document.is_empty() || slide_show_document(candidate_title) != document {
        return false;
    }
    POWERPOINT_SLIDE_SHOW_PREFIXES
        .iter()
        .any(|prefix| candidate_title.starts_with(prefix))
}

fn equal_title_predicate(original_title: &str, candidate_title: &str) -> bool {
    original_title == candidate_title
}

/// The closed set of application behaviors the handler knows about.
#[derive(Clone)]
pub enum ApplicationFamily {
    /// Chrome, Chromium, Keynote: the companion shares the owning process
    /// and satisfies a title predicate.
    Generic {
        title_predicate: TitlePredicate,
        /// When set, the original window's visibility is not a disqualifier.
        ignore_original_window: bool,
    },
    /// PowerPoint slide shows: title carries a localized prefix plus the
    /// document name; the (usually minimized) editor window is ignored.
    PowerPointSlideShow,
    /// OpenOffice Impress: the slide show is the unique same-process window
    /// with an empty title occupying a full monitor.
    OpenOfficeImpress,
}

/// Finds the full-screen companion of one nominated window.
pub struct FullScreenAppHandler {
    source_id: SourceId,
    owner_pid: Option<u32>,
    family: ApplicationFamily,
    env: Arc<dyn WindowEnvironment>,
    // Enumeration is expensive: candidates are cached per window-list
    // timestamp.
    cache_timestamp: i64,
    cache_sources: Vec<Source>,
}

impl FullScreenAppHandler {
    pub fn new(
        env: Arc<dyn WindowEnvironment>,
        source_id: SourceId,
        family: ApplicationFamily,
    ) -> Self {
        let owner_pid = env.window_owner_pid(source_id);
        Self {
            source_id,
            owner_pid,
            family,
            env,
            // Below any real window-list timestamp, so the first lookup
            // always fills the cache.
            cache_timestamp: i64::MIN,
            cache_sources: Vec::new(),
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    /// Returns the id of the full-screen companion window, or
    /// [`WINDOW_ID_NULL`] when there is no substitution.
    pub fn find_full_screen_window(
        &mut self,
        window_list: &[Source],
        timestamp_ms: i64,
    ) -> SourceId {
        match self.family.clone() {
            ApplicationFamily::Generic {
                title_predicate,
                ignore_original_window,
            } => self.find_by_title(
                window_list,
                timestamp_ms,
                title_predicate.as_ref(),
                ignore_original_window,
            ),
            ApplicationFamily::PowerPointSlideShow => {
                self.find_by_title(window_list, timestamp_ms, &slide_show_title_predicate, true)
            }
            ApplicationFamily::OpenOfficeImpress => {
                self.find_impress_slide_show(window_list, timestamp_ms)
            }
        }
    }

    fn refresh_cache(
        &mut self,
        window_list: &[Source],
        timestamp_ms: i64,
        keep: impl Fn(&Source) -> bool,
    ) {
        if timestamp_ms != self.cache_timestamp {
            self.cache_sources = window_list.iter().filter(|s| keep(s)).cloned().collect();
            self.cache_timestamp = timestamp_ms;
        }
    }

    fn find_by_title(
        &mut self,
        window_list: &[Source],
        timestamp_ms: i64,
        title_predicate: &dyn Fn(&str, &str) -> bool,
        ignore_original_window: bool,
    ) -> SourceId {
        if window_list.is_empty() {
            return WINDOW_ID_NULL;
        }
        // While the original window is still on screen there is nothing to
        // redirect.
        if !ignore_original_window && self.env.is_window_on_screen(self.source_id) {
            return WINDOW_ID_NULL;
        }
        let Some(pid) = self.owner_pid else {
            return WINDOW_ID_NULL;
        };

        let env = Arc::clone(&self.env);
        let original = self.source_id;
        self.refresh_cache(window_list, timestamp_ms, move |source| {
            source.id != original && env.window_owner_pid(source.id) == Some(pid)
        });
        if self.cache_sources.is_empty() {
            return WINDOW_ID_NULL;
        }

        // Without a title there is no way to tie the companion window to the
        // same document.
        let original_title = self.env.window_title(self.source_id).unwrap_or_default();
        if original_title.is_empty() {
            return WINDOW_ID_NULL;
        }

        for source in &self.cache_sources {
            let title = self
                .env
                .window_title(source.id)
                .unwrap_or_else(|| source.title.clone());
            if title.is_empty() || !title_predicate(&original_title, &title) {
                continue;
            }
            if !self.env.is_window_on_screen(source.id) {
                continue;
            }
            if self.env.is_window_owned_by(source.id, self.source_id) {
                continue;
            }
            if is_window_full_screen(self.env.as_ref(), source.id) {
                return source.id;
            }
        }
        WINDOW_ID_NULL
    }

    fn find_impress_slide_show(
        &mut self,
        window_list: &[Source],
        timestamp_ms: i64,
    ) -> SourceId {
        if window_list.is_empty() {
            return WINDOW_ID_NULL;
        }
        let Some(pid) = self.owner_pid else {
            return WINDOW_ID_NULL;
        };

        let env = Arc::clone(&self.env);
        self.refresh_cache(window_list, timestamp_ms, move |source| {
            env.window_owner_pid(source.id) == Some(pid)
        });

        let original_title = self.env.window_title(self.source_id).unwrap_or_default();

        // With more than one document window open it is impossible to tell
        // which document the untitled slide-show window belongs to.
        if self
            .cache_sources
            .iter()
            .any(|source| !source.title.is_empty() && source.title != original_title)
        {
            return WINDOW_ID_NULL;
        }

        self.cache_sources
            .iter()
            .find(|source| {
                source.title.is_empty() && is_window_full_screen(self.env.as_ref(), source.id)
            })
            .map(|source| source.id)
            .unwrap_or(WINDOW_ID_NULL)
    }
}

/// Maps the application owning `source_id` to a handler, or `None` for
/// applications without known full-screen behavior.
pub fn create_full_screen_app_handler(
    env: &Arc<dyn WindowEnvironment>,
    source_id: SourceId,
) -> Option<FullScreenAppHandler> {
    let pid = env.window_owner_pid(source_id)?;
    let name = env.application_name(pid)?;

    let equal: TitlePredicate = Arc::new(equal_title_predicate);
    let family = if name.starts_with("Google Chrome") || name == "Chromium" {
        ApplicationFamily::Generic {
            title_predicate: equal,
            ignore_original_window: false,
        }
    } else if name == "Microsoft PowerPoint" || name.eq_ignore_ascii_case("powerpnt.exe") {
        ApplicationFamily::PowerPointSlideShow
    } else if name == "Keynote" {
        ApplicationFamily::Generic {
            title_predicate: equal,
            ignore_original_window: false,
        }
    } else if name.contains("OpenOffice") {
        ApplicationFamily::OpenOfficeImpress
    } else {
        return None;
    };

    Some(FullScreenAppHandler::new(Arc::clone(env), source_id, family))
}

/// Builds a handler for a given source id, or `None` when the owning
/// application has no known full-screen behavior.
pub type HandlerFactory = Box<dyn Fn(SourceId) -> Option<FullScreenAppHandler> + Send>;

// The window list is refreshed at most twice per second.
const WINDOW_LIST_UPDATE_INTERVAL_MS: i64 = 500;

struct DetectorInner {
    handler_factory: HandlerFactory,
    app_handler: Option<FullScreenAppHandler>,
    last_update_time_ms: i64,
    previous_source_id: SourceId,
    // Remembers a source we failed to build a handler for, so selecting it
    // again does not retry on every tick.
    no_handler_source_id: SourceId,
    window_list: Vec<Source>,
}

impl DetectorInner {
    fn create_handler_if_needed(&mut self, source_id: SourceId) {
        if self.no_handler_source_id == source_id {
            return;
        }
        let recreate = match &self.app_handler {
            Some(handler) => handler.source_id() != source_id,
            None => true,
        };
        if recreate {
            self.app_handler = (self.handler_factory)(source_id);
            if self.app_handler.is_none() {
                self.no_handler_source_id = source_id;
            }
        }
    }
}

/// Watches the window list and substitutes a full-screen companion window
/// for the nominated capture source. Shared between capturers via `Arc`.
pub struct FullScreenWindowDetector {
    inner: Mutex<DetectorInner>,
}

impl FullScreenWindowDetector {
    pub fn new(handler_factory: HandlerFactory) -> Self {
        Self {
            inner: Mutex::new(DetectorInner {
                handler_factory,
                app_handler: None,
                last_update_time_ms: 0,
                previous_source_id: WINDOW_ID_NULL,
                no_handler_source_id: WINDOW_ID_NULL,
                window_list: Vec::new(),
            }),
        }
    }

    /// A detector whose handlers are derived from `env` per application
    /// family.
    pub fn with_environment(env: Arc<dyn WindowEnvironment>) -> Self {
        Self::new(Box::new(move |source_id| {
            create_full_screen_app_handler(&env, source_id)
        }))
    }

    /// Returns the full-screen window to capture in place of
    /// `original_source`, or [`WINDOW_ID_NULL`] for no substitution.
    pub fn find_full_screen_window(&self, original_source: SourceId) -> SourceId {
        let mut inner = self.inner.lock().unwrap();
        let timestamp = inner.last_update_time_ms;
        let window_list = std::mem::take(&mut inner.window_list);
        let result = match &mut inner.app_handler {
            Some(handler) if handler.source_id() == original_source => {
                handler.find_full_screen_window(&window_list, timestamp)
            }
            _ => WINDOW_ID_NULL,
        };
        inner.window_list = window_list;
        result
    }

    /// Called periodically by capturers; refreshes the window list through
    /// `get_sources` at most twice per second.
    pub fn update_window_list_if_needed(
        &self,
        original_source: SourceId,
        get_sources: impl FnOnce(&mut Vec<Source>) -> bool,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let source_changed = inner.previous_source_id != original_source;
        inner.previous_source_id = original_source;
        inner.create_handler_if_needed(original_source);
        if inner.app_handler.is_none() {
            inner.window_list.clear();
            return;
        }

        let now = monotonic_ms();
        if source_changed || now - inner.last_update_time_ms >= WINDOW_LIST_UPDATE_INTERVAL_MS {
            let mut window_list = Vec::new();
            if get_sources(&mut window_list) {
                inner.window_list = window_list;
                inner.last_update_time_ms = now;
            } else {
                debug!("window enumeration failed, clearing detector state");
                inner.window_list.clear();
            }
        }
    }
}
