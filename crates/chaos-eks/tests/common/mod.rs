#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chaos_infra::types::{
    ClusterInfo, ClusterSpec, InstanceDescriptor, InstanceFilter, InstanceId, InstanceState,
    Reservation,
};
use chaos_infra::{ClusterProvider, Error, InstanceProvider, Result};

/// In-memory stand-in for EC2 + EKS.
///
/// Each terminate call pops the next entry of the termination schedule:
/// `Some(n)` means the instance reports `terminated` on the n-th by-id
/// describe after the request, `None` means it never leaves `running`.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    reservations: Vec<Reservation>,
    schedule: VecDeque<Option<u32>>,
    countdowns: HashMap<InstanceId, Option<u32>>,
    by_id_reservations: Option<usize>,
    fail_describe: bool,
    calls: Calls,
}

#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub list_describes: usize,
    pub by_id_describes: usize,
    pub terminated: Vec<InstanceId>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
}

pub fn instance(id: &str, state: InstanceState, groups: &[&str]) -> InstanceDescriptor {
    InstanceDescriptor {
        instance_id: id.into(),
        state,
        group_names: groups.iter().map(|g| g.to_string()).collect(),
    }
}

impl MockProvider {
    pub fn new(reservations: Vec<Reservation>) -> Self {
        Self {
            state: Mutex::new(MockState {
                reservations,
                ..Default::default()
            }),
        }
    }

    /// `running` tagged workers of `group` split over two reservations, plus
    /// a stopped worker and a running instance of another group.
    pub fn fleet(group: &str, running: usize) -> Self {
        let workers: Vec<InstanceDescriptor> = (0..running)
            .map(|i| instance(&format!("i-worker-{i}"), InstanceState::Running, &["default", group]))
            .collect();
        let (first, second) = workers.split_at(running / 2);

        Self::new(vec![
            Reservation {
                instances: first.to_vec(),
            },
            Reservation {
                instances: second
                    .iter()
                    .cloned()
                    .chain([instance("i-stopped", InstanceState::Stopped, &[group])])
                    .collect(),
            },
            Reservation {
                instances: vec![instance("i-other", InstanceState::Running, &["other-workers"])],
            },
        ])
    }

    pub fn with_schedule(self, schedule: impl IntoIterator<Item = Option<u32>>) -> Self {
        self.state.lock().unwrap().schedule = schedule.into_iter().collect();
        self
    }

    /// Make every by-id describe return `n` copies of the matching reservation.
    pub fn with_by_id_reservations(self, n: usize) -> Self {
        self.state.lock().unwrap().by_id_reservations = Some(n);
        self
    }

    pub fn failing_describe(self) -> Self {
        self.state.lock().unwrap().fail_describe = true;
        self
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn state_of(&self, id: &str) -> Option<InstanceState> {
        let state = self.state.lock().unwrap();
        state
            .reservations
            .iter()
            .flat_map(|r| &r.instances)
            .find(|i| i.instance_id.0 == id)
            .map(|i| i.state)
    }
}

impl MockState {
    fn instance_mut(&mut self, id: &InstanceId) -> Option<&mut InstanceDescriptor> {
        self.reservations
            .iter_mut()
            .flat_map(|r| r.instances.iter_mut())
            .find(|i| &i.instance_id == id)
    }

    fn describe_by_id(&mut self, id: &InstanceId) -> Vec<Reservation> {
        self.calls.by_id_describes += 1;

        let done = match self.countdowns.get_mut(id) {
            Some(Some(remaining)) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            _ => false,
        };
        if done && let Some(instance) = self.instance_mut(id) {
            instance.state = InstanceState::Terminated;
        }

        let Some(instance) = self.instance_mut(id).cloned() else {
            return vec![];
        };
        let copies = self.by_id_reservations.unwrap_or(1);
        vec![
            Reservation {
                instances: vec![instance],
            };
            copies
        ]
    }

    fn describe_filtered(&mut self, filters: &[InstanceFilter]) -> Vec<Reservation> {
        self.calls.list_describes += 1;

        let matches = |i: &InstanceDescriptor| {
            filters.iter().all(|f| match f.name.as_str() {
                "instance-state-name" => f.values.iter().any(|v| v == i.state.as_str()),
                "network-interface.group-name" => f.values.iter().any(|v| i.in_group(v)),
                _ => true,
            })
        };

        self.reservations
            .iter()
            .map(|r| Reservation {
                instances: r.instances.iter().filter(|i| matches(i)).cloned().collect(),
            })
            .filter(|r| !r.instances.is_empty())
            .collect()
    }
}

#[async_trait]
impl InstanceProvider for MockProvider {
    async fn describe_instances(
        &self,
        _region: &str,
        filters: &[InstanceFilter],
    ) -> Result<Vec<Reservation>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_describe {
            return Err(Error::Ec2Api("describe instances: RequestLimitExceeded".into()));
        }

        let by_id = filters.iter().find(|f| f.name == "instance-id");
        Ok(match by_id {
            Some(f) => state.describe_by_id(&InstanceId(f.values[0].clone())),
            None => state.describe_filtered(filters),
        })
    }

    async fn terminate_instance(&self, _region: &str, id: &InstanceId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.terminated.push(id.clone());

        let countdown = state.schedule.pop_front().unwrap_or(Some(1));
        if countdown.is_some()
            && let Some(instance) = state.instance_mut(id)
        {
            instance.state = InstanceState::ShuttingDown;
        }
        state.countdowns.insert(id.clone(), countdown);
        Ok(())
    }
}

#[async_trait]
impl ClusterProvider for MockProvider {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<ClusterInfo> {
        self.state.lock().unwrap().calls.created.push(spec.name.clone());
        Ok(ClusterInfo {
            name: spec.name.clone(),
            arn: Some(format!("arn:aws:eks:eu-west-1:123456789012:cluster/{}", spec.name)),
            status: Some("CREATING".into()),
        })
    }

    async fn delete_cluster(&self, name: &str) -> Result<ClusterInfo> {
        self.state.lock().unwrap().calls.deleted.push(name.to_string());
        Ok(ClusterInfo {
            name: name.to_string(),
            arn: None,
            status: Some("DELETING".into()),
        })
    }
}
