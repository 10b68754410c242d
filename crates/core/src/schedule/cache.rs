use rendezvous_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Group ids compare case-insensitively.
fn normalize(group_id: &GroupId) -> GroupId {
    GroupId::from(group_id.to_lowercase())
}

/// The in-memory registry of per-group visibility schedules, written
/// through to a [ScheduleRepo].
///
/// Memory is authoritative for the life of the process. Persistence is
/// best-effort: repo failures are logged and never surface to callers.
#[derive(Debug)]
pub struct ScheduleCache {
    repo: DynScheduleRepo,
    map: Mutex<HashMap<GroupId, ScheduleState>>,
}

impl ScheduleCache {
    /// Load every persisted schedule. If the repo cannot be read the
    /// cache starts empty.
    pub fn load(repo: DynScheduleRepo) -> Self {
        let map = match repo.load_all() {
            Ok(map) => map
                .into_iter()
                .map(|(group_id, state)| (normalize(&group_id), state))
                .collect(),
            Err(err) => {
                tracing::warn!(
                    ?err,
                    "failed to load schedules, starting empty",
                );
                HashMap::new()
            }
        };

        tracing::debug!(count = map.len(), "loaded schedules");

        Self {
            repo,
            map: Mutex::new(map),
        }
    }

    /// The schedule of a group, if one is set.
    pub fn get(&self, group_id: &GroupId) -> Option<ScheduleState> {
        self.map.lock().unwrap().get(&normalize(group_id)).cloned()
    }

    /// A snapshot of every schedule.
    pub fn get_all(&self) -> HashMap<GroupId, ScheduleState> {
        self.map.lock().unwrap().clone()
    }

    /// Set the schedule of a group. Last writer wins.
    pub fn set(&self, group_id: &GroupId, mut state: ScheduleState) {
        state.time_zone = state
            .time_zone
            .map(|tz| tz.trim().to_string())
            .filter(|tz| !tz.is_empty());

        let group_id = normalize(group_id);

        tracing::debug!(
            %group_id,
            recurring = state.recurring,
            weekdays = ?state.active_weekdays,
            start = ?state.time_start_local,
            end = ?state.time_end_local,
            tz = ?state.time_zone,
            "set schedule",
        );

        // hold the lock across the write so the repo sees writes in
        // the same order as memory
        let mut map = self.map.lock().unwrap();
        if let Err(err) = self.repo.save(&group_id, &state) {
            tracing::warn!(%group_id, ?err, "failed to persist schedule");
        }
        map.insert(group_id, state);
    }

    /// Remove the schedule of a group.
    pub fn clear(&self, group_id: &GroupId) {
        let group_id = normalize(group_id);

        let mut map = self.map.lock().unwrap();
        map.remove(&group_id);
        if let Err(err) = self.repo.remove(&group_id) {
            tracing::warn!(
                %group_id,
                ?err,
                "failed to clear persisted schedule",
            );
        }

        tracing::debug!(%group_id, "cleared schedule");
    }

    /// Evaluate the schedule of a group at `now`.
    /// `None` if the group has no schedule.
    pub fn desired_visibility(
        &self,
        group_id: &GroupId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<Visibility> {
        self.get(group_id).map(|state| super::evaluate(&state, now))
    }
}

/// A [ScheduleRepo] keeping every schedule in one json file.
///
/// Each write rewrites the whole file through a tempfile in the same
/// directory followed by a rename, so readers never see a torn file.
#[derive(Debug)]
pub struct JsonFileScheduleRepo {
    path: std::path::PathBuf,
    lock: Mutex<()>,
}

impl JsonFileScheduleRepo {
    /// Construct a repo backed by the file at `path`. The file need not
    /// exist yet, its parent directory must.
    pub fn create(path: impl Into<std::path::PathBuf>) -> DynScheduleRepo {
        let out: DynScheduleRepo = Arc::new(Self {
            path: path.into(),
            lock: Mutex::new(()),
        });
        out
    }

    fn read(&self) -> RvResult<HashMap<GroupId, ScheduleState>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(err) => {
                return Err(RvError::store_src("read schedule file", err))
            }
        };
        serde_json::from_slice(&data)
            .map_err(|e| RvError::store_src("decode schedule file", e))
    }

    fn write(&self, map: &HashMap<GroupId, ScheduleState>) -> RvResult<()> {
        use std::io::Write;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => std::path::Path::new("."),
        };

        let data = serde_json::to_vec_pretty(map)
            .map_err(|e| RvError::other_src("encode schedule file", e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| RvError::store_src("create schedule tempfile", e))?;
        tmp.write_all(&data)
            .and_then(|_| tmp.as_file().sync_data())
            .map_err(|e| RvError::store_src("write schedule tempfile", e))?;
        tmp.persist(&self.path)
            .map_err(|e| RvError::store_src("persist schedule file", e.error))?;

        Ok(())
    }
}

impl ScheduleRepo for JsonFileScheduleRepo {
    fn load_all(&self) -> RvResult<HashMap<GroupId, ScheduleState>> {
        let _g = self.lock.lock().unwrap();
        self.read()
    }

    fn save(&self, group_id: &GroupId, state: &ScheduleState) -> RvResult<()> {
        let _g = self.lock.lock().unwrap();
        let mut map = self.read()?;
        map.insert(group_id.clone(), state.clone());
        self.write(&map)
    }

    fn remove(&self, group_id: &GroupId) -> RvResult<()> {
        let _g = self.lock.lock().unwrap();
        let mut map = self.read()?;
        if map.remove(group_id).is_some() {
            self.write(&map)?;
        }
        Ok(())
    }
}
