//! Job nets: named DAGs of job templates run as one composite job.
//!
//! Net jobs refer to each other by name through [`NetCondition`]s. A net is
//! validated as a whole (unknown references, cycles) and instantiated per
//! payload with [`Net::for_payload`]. Running the resulting definition
//! creates every net job as a child of the composite job.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

mod condition;
mod net;
mod order;

pub use condition::{
    and, depends_on, discard_on, explicit, job_discarded, job_done, job_failed, job_finished,
    job_state_reached, not, or, JobCheck, NetCondition,
};
pub use net::{define_net, net_job, Net, NetJob, RunnerFactory};

use crate::scheduler::condition::Explicit;
use crate::scheduler::Job;

/// What runner factories of one net instance see.
#[derive(Debug)]
pub struct NetContext {
    payload: Value,
    jobs: BTreeMap<String, Job>,
    conditions: BTreeMap<String, Arc<Explicit>>,
}

impl NetContext {
    /// The payload the instance was created for.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// A job created so far, by net job name.
    #[must_use]
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.get(name)
    }

    /// Jobs created so far.
    #[must_use]
    pub const fn jobs(&self) -> &BTreeMap<String, Job> {
        &self.jobs
    }

    /// An explicit condition declared on the net.
    #[must_use]
    pub fn condition(&self, name: &str) -> Option<&Arc<Explicit>> {
        self.conditions.get(name)
    }
}
