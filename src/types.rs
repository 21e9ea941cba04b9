use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::collections::{HashMap, HashSet};

/// A Pod lifecycle notification from the event source.
#[derive(Debug, Clone)]
pub enum PodEvent {
    Created(Pod),
    Deleted(Pod),
    Updated { old: Pod, new: Pod },
}

impl PodEvent {
    /// The Pod state after the event. Deletions carry the last known object.
    pub fn pod(&self) -> &Pod {
        match self {
            PodEvent::Created(pod) | PodEvent::Deleted(pod) => pod,
            PodEvent::Updated { new, .. } => new,
        }
    }

    /// The Pod state before an update.
    pub fn previous(&self) -> Option<&Pod> {
        match self {
            PodEvent::Updated { old, .. } => Some(old),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PodEvent::Created(_) => "created",
            PodEvent::Deleted(_) => "deleted",
            PodEvent::Updated { .. } => "updated",
        }
    }
}

/// Last seen object per pod, used to turn watch events into `PodEvent`s.
///
/// A re-list (`Init` .. `InitDone`) does not report pods deleted while the
/// watch was down, so entries not seen during the re-list are dropped at its end.
#[derive(Debug, Default)]
pub struct SeenPods {
    pods: HashMap<String, Pod>,
    relisted: Option<HashSet<String>>,
}

impl SeenPods {
    pub fn init(&mut self) {
        self.relisted = Some(HashSet::new());
    }

    pub fn apply(&mut self, pod: Pod) -> PodEvent {
        let key = pod_key(&pod);
        if let Some(relisted) = &mut self.relisted {
            relisted.insert(key.clone());
        }
        match self.pods.insert(key, pod.clone()) {
            Some(old) => PodEvent::Updated { old, new: pod },
            None => PodEvent::Created(pod),
        }
    }

    pub fn delete(&mut self, pod: Pod) -> PodEvent {
        self.pods.remove(&pod_key(&pod));
        PodEvent::Deleted(pod)
    }

    pub fn init_done(&mut self) {
        if let Some(relisted) = self.relisted.take() {
            self.pods.retain(|key, _| relisted.contains(key));
        }
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}

fn pod_key(pod: &Pod) -> String {
    format!("{}/{}", pod.namespace().unwrap_or_default(), pod.name_any())
}

/// What a create-or-update call did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyReport {
    pub namespace: String,
    pub name: String,
    pub pod_names: Vec<String>,
    pub role: Applied,
    pub service_account: Option<Applied>,
    pub role_binding: Option<Applied>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The Pod does not carry the opt-in label.
    Skipped,
    Reconciled(PolicyReport),
}
