//! Snapshot persistence.
//!
//! A [`LedgerSnapshot`] is a plain serde view of the complete ledger state.
//! [`SnapshotStore`] keeps one snapshot in a JSON file, replacing it
//! atomically on every save. Processes sharing the file serialize their
//! load-modify-save cycles through [`SnapshotStore::locked`].

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::address::Address;
use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use crate::metrics::SecurityMetrics;
use crate::report::{ReportId, ThreatReport};
use crate::reputation::{ContractReputation, ReporterScore};
use crate::threat::{ThreatType, MAX_RISK_SCORE};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Amount paid out to one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disbursement {
    /// Recipient.
    pub identity: Address,
    /// Total paid.
    pub amount: Amount,
}

/// Reporter score of one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterScoreEntry {
    /// The identity.
    pub identity: Address,
    /// Its score.
    pub score: ReporterScore,
}

/// Full ledger state.
///
/// Collections are ordered: reports in submission order, everything else by
/// identity, so equal states serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Format version.
    pub version: u32,
    /// Owner identity.
    pub owner: Address,
    /// Report fee.
    pub report_fee: Amount,
    /// Validation reward.
    pub validation_reward: Amount,
    /// Retained balance.
    pub balance: Amount,
    /// Payouts per identity.
    pub disbursements: Vec<Disbursement>,
    /// Validator set.
    pub validators: Vec<Address>,
    /// Known reporter scores.
    pub reporter_scores: Vec<ReporterScoreEntry>,
    /// Every report.
    pub reports: Vec<ThreatReport>,
    /// Every target aggregate.
    pub reputations: Vec<ContractReputation>,
    /// Ledger-wide counters.
    pub metrics: SecurityMetrics,
    /// Next report nonce.
    pub report_nonce: u64,
    /// Last event sequence number issued.
    pub event_sequence: u64,
}

fn corrupt(message: impl Into<String>) -> LedgerError {
    LedgerError::CorruptSnapshot(message.into())
}

#[derive(Default)]
struct TargetTotals {
    cumulative: u64,
    count: u64,
    by_type: [u64; ThreatType::COUNT],
}

impl LedgerSnapshot {
    /// Check that the snapshot describes a state the ledger could have
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CorruptSnapshot`] naming the first
    /// inconsistency found.
    pub fn verify(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        if self.owner.is_zero() {
            return Err(corrupt("owner is the zero address"));
        }

        let mut ids: HashSet<ReportId> = HashSet::with_capacity(self.reports.len());
        let mut totals: HashMap<Address, TargetTotals> = HashMap::new();
        let mut valid = 0u64;
        let mut invalid = 0u64;
        for report in &self.reports {
            if !ids.insert(report.id) {
                return Err(corrupt(format!("duplicate report {}", report.id)));
            }
            if report.risk_score > MAX_RISK_SCORE {
                return Err(corrupt(format!("report {} has score {}", report.id, report.risk_score)));
            }
            match (&report.verdict, report.validated) {
                (Some(verdict), true) if verdict.valid => valid += 1,
                (Some(_), true) => invalid += 1,
                (None, false) => {}
                _ => {
                    return Err(corrupt(format!(
                        "report {} has inconsistent verdict state",
                        report.id
                    )));
                }
            }
            let entry = totals.entry(report.target).or_default();
            entry.cumulative += u64::from(report.risk_score);
            entry.count += 1;
            entry.by_type[report.threat_type.index()] += 1;
        }

        let mut flagged = 0u64;
        let mut seen: HashSet<Address> = HashSet::with_capacity(self.reputations.len());
        for reputation in &self.reputations {
            if !seen.insert(reputation.target) {
                return Err(corrupt(format!("duplicate reputation for {}", reputation.target)));
            }
            let expected = totals.remove(&reputation.target).ok_or_else(|| {
                corrupt(format!("reputation for {} has no reports", reputation.target))
            })?;
            if expected.count != reputation.report_count
                || expected.cumulative != reputation.cumulative_score
                || expected.by_type != reputation.threat_counts
            {
                return Err(corrupt(format!(
                    "reputation for {} does not match its reports",
                    reputation.target
                )));
            }
            if reputation.flagged {
                flagged += 1;
            }
        }
        if let Some(target) = totals.keys().next() {
            return Err(corrupt(format!("reports against {target} have no reputation")));
        }

        let expected_metrics = SecurityMetrics {
            total_contracts: self.reputations.len() as u64,
            flagged_contracts: flagged,
            validated_reports: valid,
            false_positives: invalid,
        };
        if expected_metrics != self.metrics {
            return Err(corrupt("security metrics do not match reports"));
        }

        if self.report_nonce < self.reports.len() as u64 {
            return Err(corrupt("report nonce is behind the report count"));
        }
        if let Some(entry) = self
            .reporter_scores
            .iter()
            .find(|e| e.score > ReporterScore::MAX)
        {
            return Err(corrupt(format!("score of {} is out of range", entry.identity)));
        }

        Ok(())
    }
}

/// JSON file holding one ledger snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file carrying the advisory lock, `<file name>.lock`.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Whether a snapshot has been saved.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Run `f` while holding an exclusive lock on the store.
    ///
    /// The lock is advisory and held on [`Self::lock_path`], so it covers
    /// every process and thread that goes through this method. Wrap a whole
    /// load-modify-save cycle in it; separate calls to [`Self::load`] and
    /// [`Self::save`] can otherwise interleave and drop updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened or locked, or
    /// whatever `f` returns.
    pub fn locked<T, E>(
        &self,
        f: impl FnOnce(&Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<LedgerError>,
    {
        let mut lock = self.open_lock().map_err(E::from)?;
        let _guard = lock.write().map_err(|e| E::from(LedgerError::Io(e)))?;
        debug!(lock = %self.lock_path().display(), "store locked");
        f(self)
    }

    fn open_lock(&self) -> Result<FileLock<fs::File>> {
        fs::create_dir_all(self.dir())?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        Ok(FileLock::new(file))
    }

    /// Write a snapshot, replacing any previous one.
    ///
    /// The data goes to a uniquely named temp file in the same directory and
    /// is renamed into place, so readers never see a partial write and
    /// concurrent savers never share a temp file.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or serialization failure.
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(dir)?;
        let json = serde_json::to_vec_pretty(snapshot)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), reports = snapshot.reports.len(), "snapshot saved");
        Ok(())
    }

    /// Read and verify the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, malformed or
    /// inconsistent.
    pub fn load(&self) -> Result<LedgerSnapshot> {
        let bytes = fs::read(&self.path)?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.verify()?;
        debug!(path = %self.path.display(), reports = snapshot.reports.len(), "snapshot loaded");
        Ok(snapshot)
    }
}
