//! Progressive memory scanner
//!
//! A scan session starts with [`MemScanner::first_scan`], which seeds the result
//! set from a RAM snapshot, and is narrowed by [`MemScanner::next_scan`], which
//! compares a fresh snapshot against the previous one. Every next scan pushes
//! the previous result set on a bounded undo stack.
//!
//! An unknown-initial first scan keeps no addresses at all: every aligned
//! address of the range is a candidate, and the count is derived from the
//! range. The first next scan materialises the survivors.

use crate::config::ScannerConfig;
use crate::core::types::{
    format_memory, parse_memory, ConsoleAddress, MemBase, MemoryError, MemoryResult,
    Number, ScanFilter, ScanSettings, ScanState, UndoEntry, UNKNOWN_VALUE,
};
use crate::memory::cache::RamSnapshot;
use crate::process::DolphinAccessor;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aligned candidate addresses inside one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRun {
    pub first: ConsoleAddress,
    pub count: usize,
    pub stride: usize,
}

impl CandidateRun {
    pub fn address(&self, index: usize) -> ConsoleAddress {
        self.first + (index * self.stride) as u32
    }

    pub fn addresses(self) -> impl Iterator<Item = ConsoleAddress> {
        (0..self.count).map(move |i| self.address(i))
    }
}

/// Splits the scan range into runs of aligned candidates, one per region.
///
/// A candidate is any `address` aligned to `stride` whose `element_size` bytes
/// fit entirely inside both the range and the region.
pub fn candidate_runs(
    snapshot: &RamSnapshot,
    range: Option<(ConsoleAddress, ConsoleAddress)>,
    stride: usize,
    element_size: usize,
) -> Vec<CandidateRun> {
    let (lo, hi) = match range {
        Some((begin, end)) => (begin as u64, end as u64),
        None => (0, u64::MAX),
    };
    let stride = stride.max(1) as u64;
    let size = element_size.max(1) as u64;

    snapshot
        .segments()
        .iter()
        .filter_map(|segment| {
            let start = lo.max(segment.console_start as u64);
            let end = hi.min(segment.console_end());
            let first = start.div_ceil(stride) * stride;
            if first + size > end {
                return None;
            }
            let count = ((end - size - first) / stride + 1) as usize;
            Some(CandidateRun {
                first: first as ConsoleAddress,
                count,
                stride: stride as usize,
            })
        })
        .collect()
}

/// Parsed scan terms bound to the settings of the session
#[derive(Debug, Clone)]
struct Matcher {
    filter: ScanFilter,
    settings: ScanSettings,
    raw: Vec<u8>,
    first: Option<Number>,
    second: Option<Number>,
}

impl Matcher {
    fn new(
        filter: ScanFilter,
        settings: ScanSettings,
        term1: Option<&str>,
        term2: Option<&str>,
    ) -> MemoryResult<Self> {
        let ty = settings.mem_type;
        if !ty.is_numeric() && filter != ScanFilter::Exact {
            return Err(MemoryError::invalid_input(format!(
                "{} values can only be scanned for an exact match",
                ty
            )));
        }

        let parse = |term: Option<&str>, which: &str| -> MemoryResult<Vec<u8>> {
            let term = term
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| {
                    MemoryError::invalid_input(format!("{:?} needs a {} term", filter, which))
                })?;
            parse_memory(term, ty, settings.base, settings.signedness, settings.length)
        };
        let decode = |bytes: &[u8]| {
            Number::decode(bytes, ty, settings.signedness)
        };

        let mut matcher = Matcher {
            filter,
            settings,
            raw: Vec::new(),
            first: None,
            second: None,
        };

        if filter.requires_value() {
            matcher.raw = parse(term1, "first")?;
            matcher.first = decode(&matcher.raw);
        }
        if filter.requires_second_value() {
            let raw = parse(term2, "second")?;
            matcher.second = decode(&raw);
        }

        Ok(matcher)
    }

    /// Bytes compared at each candidate
    fn element_size(&self) -> usize {
        match self.settings.mem_type.fixed_size() {
            Some(size) => size,
            None if !self.raw.is_empty() => self.raw.len(),
            None => self.settings.element_size(),
        }
    }

    fn matches(&self, current: &[u8], previous: Option<&[u8]>) -> bool {
        if !self.settings.mem_type.is_numeric() {
            return current == self.raw.as_slice();
        }

        let ty = self.settings.mem_type;
        let signedness = self.settings.signedness;
        let Some(value) = Number::decode(current, ty, signedness) else {
            return false;
        };
        if value.is_nan() {
            return false;
        }
        let older = previous.and_then(|bytes| Number::decode(bytes, ty, signedness));

        use std::cmp::Ordering::*;
        match self.filter {
            ScanFilter::UnknownInitial => true,
            ScanFilter::Exact => self.compare_first(&value) == Some(Equal),
            ScanFilter::BiggerThan => self.compare_first(&value) == Some(Greater),
            ScanFilter::SmallerThan => self.compare_first(&value) == Some(Less),
            ScanFilter::Between => match (&self.first, &self.second) {
                (Some(low), Some(high)) => {
                    matches!(value.compare(low), Some(Greater | Equal))
                        && matches!(value.compare(high), Some(Less | Equal))
                }
                _ => false,
            },
            ScanFilter::Increased => compare(&value, older.as_ref()) == Some(Greater),
            ScanFilter::Decreased => compare(&value, older.as_ref()) == Some(Less),
            ScanFilter::Changed => matches!(compare(&value, older.as_ref()), Some(Less | Greater)),
            ScanFilter::Unchanged => compare(&value, older.as_ref()) == Some(Equal),
            ScanFilter::IncreasedBy => match (older, &self.first) {
                (Some(older), Some(delta)) => value.equals_offset(&older, delta),
                _ => false,
            },
            ScanFilter::DecreasedBy => match (older, &self.first) {
                (Some(older), Some(delta)) => older.equals_offset(&value, delta),
                _ => false,
            },
        }
    }

    fn compare_first(&self, value: &Number) -> Option<std::cmp::Ordering> {
        self.first.as_ref().and_then(|term| value.compare(term))
    }
}

fn compare(value: &Number, older: Option<&Number>) -> Option<std::cmp::Ordering> {
    older.and_then(|older| value.compare(older))
}

/// A scan session
pub struct MemScanner {
    settings: ScanSettings,
    state: ScanState,
    results: Vec<ConsoleAddress>,
    was_unknown_initial: bool,
    result_count: usize,
    element_size: usize,
    scan_snapshot: Option<Arc<RamSnapshot>>,
    undo: VecDeque<UndoEntry>,
    undo_depth: usize,
    pool: Option<rayon::ThreadPool>,
}

impl MemScanner {
    /// Creates an unstarted session keeping at most `undo_depth` undo steps
    pub fn new(undo_depth: usize) -> Self {
        MemScanner {
            settings: ScanSettings::default(),
            state: ScanState::Unstarted,
            results: Vec::new(),
            was_unknown_initial: false,
            result_count: 0,
            element_size: 0,
            scan_snapshot: None,
            undo: VecDeque::new(),
            undo_depth,
            pool: None,
        }
    }

    /// Creates a session from the `[scanner]` configuration
    pub fn from_config(config: &ScannerConfig) -> Self {
        let mut scanner = Self::new(config.undo_depth);
        scanner.settings.enforce_alignment = config.enforce_alignment;
        scanner.set_max_threads(config.max_threads);
        scanner
    }

    /// Runs scans on a dedicated pool of `threads` workers instead of the
    /// global rayon pool
    pub fn set_max_threads(&mut self, threads: usize) {
        self.pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Falling back to the global thread pool: {}", e);
                None
            }
        };
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Replaces the settings. Only allowed before the first scan.
    pub fn set_settings(&mut self, settings: ScanSettings) -> MemoryResult<()> {
        if self.state == ScanState::Active {
            return Err(MemoryError::invalid_input(
                "scan settings cannot change while a scan is active",
            ));
        }
        if let Some((begin, end)) = settings.range {
            if begin >= end {
                return Err(MemoryError::invalid_input(format!(
                    "empty scan range 0x{:08X}..0x{:08X}",
                    begin, end
                )));
            }
        }
        self.settings = settings;
        Ok(())
    }

    /// Changes the base used to parse terms and display values
    pub fn set_base(&mut self, base: MemBase) {
        self.settings.base = base;
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ScanState::Active
    }

    /// Whether the results are still every candidate of an unknown-initial scan
    pub fn was_unknown_initial(&self) -> bool {
        self.was_unknown_initial
    }

    pub fn result_count(&self) -> usize {
        self.result_count
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    /// Snapshot the current results were evaluated against
    pub fn scan_snapshot(&self) -> Option<&Arc<RamSnapshot>> {
        self.scan_snapshot.as_ref()
    }

    /// Current result addresses in scan order
    pub fn results(&self) -> Box<dyn Iterator<Item = ConsoleAddress> + '_> {
        if self.was_unknown_initial {
            Box::new(
                self.candidate_runs()
                    .into_iter()
                    .flat_map(CandidateRun::addresses),
            )
        } else {
            Box::new(self.results.iter().copied())
        }
    }

    /// Address of the `index`th result
    pub fn result_at(&self, index: usize) -> Option<ConsoleAddress> {
        if !self.was_unknown_initial {
            return self.results.get(index).copied();
        }

        let mut index = index;
        for run in self.candidate_runs() {
            if index < run.count {
                return Some(run.address(index));
            }
            index -= run.count;
        }
        None
    }

    /// Starts a session.
    ///
    /// Any previous session is discarded. Fails with `InvalidInput` for
    /// filters or terms that do not fit the settings, `InputTooLong` for
    /// oversized string and byte array terms and an operation failure when the
    /// RAM cannot be read.
    pub fn first_scan(
        &mut self,
        accessor: &mut DolphinAccessor,
        filter: ScanFilter,
        term1: Option<&str>,
        term2: Option<&str>,
    ) -> MemoryResult<usize> {
        if !filter.allowed_on_first_scan() {
            return Err(MemoryError::invalid_input(format!(
                "{:?} needs a previous scan",
                filter
            )));
        }
        let matcher = Matcher::new(filter, self.settings, term1, term2)?;

        let snapshot = accessor.refresh_cache()?;
        self.reset();

        let element_size = matcher.element_size();
        let runs = candidate_runs(
            &snapshot,
            self.settings.range,
            self.settings.stride(),
            element_size,
        );

        if filter == ScanFilter::UnknownInitial {
            self.was_unknown_initial = true;
            self.result_count = runs.iter().map(|run| run.count).sum();
        } else {
            let results = self.evaluate_runs(&runs, &snapshot, None, &matcher, element_size);
            self.result_count = results.len();
            self.results = results;
        }

        self.element_size = element_size;
        self.scan_snapshot = Some(snapshot);
        self.state = ScanState::Active;

        info!(
            "First scan ({:?}, {}) kept {} results",
            filter, self.settings.mem_type, self.result_count
        );
        Ok(self.result_count)
    }

    /// Narrows the active session against a fresh snapshot
    pub fn next_scan(
        &mut self,
        accessor: &mut DolphinAccessor,
        filter: ScanFilter,
        term1: Option<&str>,
        term2: Option<&str>,
    ) -> MemoryResult<usize> {
        if self.state != ScanState::Active {
            return Err(MemoryError::ScanNotStarted);
        }
        if !filter.allowed_on_next_scan() {
            return Err(MemoryError::invalid_input(format!(
                "{:?} can only start a scan",
                filter
            )));
        }
        let matcher = Matcher::new(filter, self.settings, term1, term2)?;
        let element_size = matcher.element_size();

        let snapshot = accessor.refresh_cache()?;
        let previous = self.scan_snapshot.clone();

        let results = if self.was_unknown_initial {
            let runs = candidate_runs(
                &snapshot,
                self.settings.range,
                self.settings.stride(),
                element_size,
            );
            self.evaluate_runs(&runs, &snapshot, previous.as_deref(), &matcher, element_size)
        } else {
            self.evaluate_results(&snapshot, previous.as_deref(), &matcher, element_size)
        };

        self.push_undo();
        self.results = results;
        self.was_unknown_initial = false;
        self.result_count = self.results.len();
        self.element_size = element_size;
        self.scan_snapshot = Some(snapshot);

        info!("Next scan ({:?}) kept {} results", filter, self.result_count);
        Ok(self.result_count)
    }

    /// Restores the result set from before the last next scan.
    ///
    /// Returns false when there is nothing to undo.
    pub fn undo_scan(&mut self) -> bool {
        let Some(entry) = self.undo.pop_back() else {
            return false;
        };

        self.results = entry.results;
        self.was_unknown_initial = entry.was_unknown_initial;
        self.result_count = if self.was_unknown_initial {
            self.candidate_runs().iter().map(|run| run.count).sum()
        } else {
            self.results.len()
        };
        debug!("Undo restored {} results", self.result_count);
        true
    }

    /// Discards results, snapshot and undo history
    pub fn reset(&mut self) {
        self.state = ScanState::Unstarted;
        self.results = Vec::new();
        self.was_unknown_initial = false;
        self.result_count = 0;
        self.element_size = 0;
        self.scan_snapshot = None;
        self.undo.clear();
    }

    /// Value of the `index`th result as it was at the last scan
    pub fn formatted_scanned_value_at(&self, index: usize) -> String {
        match &self.scan_snapshot {
            Some(snapshot) => self.formatted_value_at(index, snapshot),
            None => UNKNOWN_VALUE.to_string(),
        }
    }

    /// Value of the `index`th result in `snapshot`
    pub fn formatted_current_value_at(&self, index: usize, snapshot: &RamSnapshot) -> String {
        self.formatted_value_at(index, snapshot)
    }

    fn formatted_value_at(&self, index: usize, snapshot: &RamSnapshot) -> String {
        let Some(address) = self.result_at(index) else {
            return UNKNOWN_VALUE.to_string();
        };
        match snapshot.bytes_at(address, self.element_size) {
            Some(bytes) => format_memory(
                bytes,
                self.settings.mem_type,
                self.settings.base,
                self.settings.signedness,
            ),
            None => UNKNOWN_VALUE.to_string(),
        }
    }

    fn candidate_runs(&self) -> Vec<CandidateRun> {
        match &self.scan_snapshot {
            Some(snapshot) => candidate_runs(
                snapshot,
                self.settings.range,
                self.settings.stride(),
                self.element_size,
            ),
            None => Vec::new(),
        }
    }

    fn push_undo(&mut self) {
        if self.undo_depth == 0 {
            return;
        }
        if self.undo.len() == self.undo_depth {
            self.undo.pop_front();
        }
        self.undo.push_back(UndoEntry {
            results: self.results.clone(),
            was_unknown_initial: self.was_unknown_initial,
        });
    }

    fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn evaluate_runs(
        &self,
        runs: &[CandidateRun],
        snapshot: &RamSnapshot,
        previous: Option<&RamSnapshot>,
        matcher: &Matcher,
        element_size: usize,
    ) -> Vec<ConsoleAddress> {
        self.install(|| {
            runs.iter()
                .flat_map(|run| {
                    (0..run.count)
                        .into_par_iter()
                        .filter_map(|i| {
                            let address = run.address(i);
                            keep(address, snapshot, previous, matcher, element_size)
                                .then_some(address)
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        })
    }

    fn evaluate_results(
        &self,
        snapshot: &RamSnapshot,
        previous: Option<&RamSnapshot>,
        matcher: &Matcher,
        element_size: usize,
    ) -> Vec<ConsoleAddress> {
        self.install(|| {
            self.results
                .par_iter()
                .copied()
                .filter(|&address| keep(address, snapshot, previous, matcher, element_size))
                .collect()
        })
    }
}

/// Evaluates one candidate. Candidates whose bytes are not cached are dropped.
fn keep(
    address: ConsoleAddress,
    snapshot: &RamSnapshot,
    previous: Option<&RamSnapshot>,
    matcher: &Matcher,
    element_size: usize,
) -> bool {
    let Some(current) = snapshot.bytes_at(address, element_size) else {
        return false;
    };
    if matcher.filter.requires_previous() {
        match previous.and_then(|p| p.bytes_at(address, element_size)) {
            Some(older) => matcher.matches(current, Some(older)),
            None => false,
        }
    } else {
        matcher.matches(current, None)
    }
}

impl std::fmt::Debug for MemScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemScanner")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("result_count", &self.result_count)
            .field("was_unknown_initial", &self.was_unknown_initial)
            .field("undo", &self.undo.len())
            .finish()
    }
}
