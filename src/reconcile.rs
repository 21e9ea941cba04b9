use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::{Metadata, Resource};
use kube::ResourceExt;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::kubernetes::{NamespacedObject, ResourceStore};
use crate::policy::{LabelGate, PolicySynthesizer};
use crate::types::{Applied, Outcome, PodEvent, PolicyReport};
use crate::utils::selector_string;

/// Page size used when listing a Deployment's pods.
pub const POD_PAGE_SIZE: u32 = 100;

const DEFAULT_NAMESPACE: &str = "default";

/// Runs one reconciliation pass per pod event: gate, resolve the owning
/// Deployment, discover its pods, then create or update the RBAC objects.
pub struct Reconciler<S> {
    store: S,
    gate: LabelGate,
    synthesizer: PolicySynthesizer,
    create_sa_and_rolebinding: bool,
}

impl<S: ResourceStore> Reconciler<S> {
    pub fn new(store: S, create_sa_and_rolebinding: bool) -> Self {
        Self {
            store,
            gate: LabelGate::default(),
            synthesizer: PolicySynthesizer::default(),
            create_sa_and_rolebinding,
        }
    }

    pub fn gate(&self) -> &LabelGate {
        &self.gate
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Entry point for the event source. Errors end the pass and are only logged.
    pub async fn handle(&self, event: PodEvent) {
        let pod = event.pod();
        let phase = |pod: &Pod| {
            pod.status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        };
        debug!(
            "Pod {}: {}/{} | Phase: {}{}",
            event.kind(),
            namespace_of(pod.metadata()),
            pod.name_any(),
            phase(pod),
            event
                .previous()
                .map(|old| format!(" (was {})", phase(old)))
                .unwrap_or_default()
        );

        match self.reconcile(pod).await {
            Ok(Outcome::Skipped) => {}
            Ok(Outcome::Reconciled(report)) => {
                debug!(
                    "Reconciled {}/{} for {} pods | Role: {:?} | ServiceAccount: {:?} | RoleBinding: {:?}",
                    report.namespace,
                    report.name,
                    report.pod_names.len(),
                    report.role,
                    report.service_account,
                    report.role_binding
                );
            }
            Err(e) => error!("{}", e),
        }
    }

    pub async fn reconcile(&self, pod: &Pod) -> Result<Outcome> {
        if !self.gate.in_scope(pod) {
            return Ok(Outcome::Skipped);
        }
        let namespace = namespace_of(pod.metadata());
        info!(
            "Found pod {} in namespace {} with label {}",
            pod.name_any(),
            namespace,
            self.gate.selector()
        );

        let rs = self.resolve_replica_set(pod).await?;
        info!("Found ReplicaSet: {}", rs.name_any());

        let deploy = self.resolve_deployment(&rs).await?;
        let deploy_name = deploy.name_any();
        info!("Found Deployment: {}", deploy_name);

        let pod_names = self.discover_pod_names(&deploy).await?;
        info!("Found pods of {}: {:?}", deploy_name, pod_names);

        let desired = self
            .synthesizer
            .synthesize(&deploy_name, &namespace, &pod_names);
        let name = desired.name().to_string();

        let role = self.apply(desired.role).await?;
        match role {
            Applied::Created => info!("Created Role {} with resourceNames {:?}", name, pod_names),
            Applied::Updated => info!("Updated Role {} with resourceNames {:?}", name, pod_names),
        }

        let (service_account, role_binding) = if self.create_sa_and_rolebinding {
            let sa = self.apply(desired.service_account).await?;
            info!("{} ServiceAccount {}", verb(sa), name);
            let rb = self.apply(desired.role_binding).await?;
            info!("{} RoleBinding {}", verb(rb), name);
            (Some(sa), Some(rb))
        } else {
            (None, None)
        };

        Ok(Outcome::Reconciled(PolicyReport {
            namespace,
            name,
            pod_names,
            role,
            service_account,
            role_binding,
        }))
    }

    pub async fn resolve_replica_set(&self, pod: &Pod) -> Result<ReplicaSet> {
        self.resolve_owner(pod).await
    }

    pub async fn resolve_deployment(&self, rs: &ReplicaSet) -> Result<Deployment> {
        self.resolve_owner(rs).await
    }

    /// Fetches the first owner of kind `O` listed on `child`, from the child's namespace.
    async fn resolve_owner<C, O>(&self, child: &C) -> Result<O>
    where
        C: NamespacedObject,
        O: NamespacedObject,
    {
        let meta = child.metadata();
        let namespace = namespace_of(meta);
        let owner = meta
            .owner_references
            .iter()
            .flatten()
            .find(|r| r.kind == O::KIND)
            .ok_or_else(|| Error::OwnershipNotFound {
                kind: C::KIND,
                namespace: namespace.clone(),
                name: meta.name.clone().unwrap_or_default(),
                owner_kind: O::KIND,
            })?;

        match self.store.get::<O>(&namespace, &owner.name).await {
            Ok(Some(obj)) => Ok(obj),
            Ok(None) => Err(Error::NotFound {
                kind: O::KIND,
                namespace,
                name: owner.name.clone(),
            }),
            Err(source) => Err(Error::Lookup {
                kind: O::KIND,
                namespace,
                name: owner.name.clone(),
                source,
            }),
        }
    }

    /// Names of the pods currently matched by the Deployment's selector, in list order.
    pub async fn discover_pod_names(&self, deploy: &Deployment) -> Result<Vec<String>> {
        let namespace = namespace_of(deploy.metadata());
        let selector = deploy
            .spec
            .as_ref()
            .and_then(|spec| selector_string(&spec.selector))
            .ok_or_else(|| Error::MissingSelector {
                namespace: namespace.clone(),
                name: deploy.name_any(),
            })?;

        let mut names = Vec::new();
        let mut continue_token: Option<String> = None;
        loop {
            let page = self
                .store
                .list::<Pod>(&namespace, &selector, POD_PAGE_SIZE, continue_token.as_deref())
                .await
                .map_err(|source| Error::Lookup {
                    kind: Pod::KIND,
                    namespace: namespace.clone(),
                    name: selector.clone(),
                    source,
                })?;
            names.extend(page.items.iter().map(|pod| pod.name_any()));

            match page.continue_token {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }
        Ok(names)
    }

    /// Creates `desired` if absent, otherwise overwrites the stored object with it.
    pub async fn apply<K: NamespacedObject>(&self, mut desired: K) -> Result<Applied> {
        let namespace = namespace_of(desired.metadata());
        let name = desired.metadata().name.clone().unwrap_or_default();
        let write_err = |source: kube::Error| Error::Write {
            kind: K::KIND,
            namespace: namespace.clone(),
            name: name.clone(),
            source,
        };

        match self.store.get::<K>(&namespace, &name).await {
            Ok(None) => {
                self.store
                    .create(&namespace, &desired)
                    .await
                    .map_err(write_err)?;
                Ok(Applied::Created)
            }
            Ok(Some(live)) => {
                // Let the server reject the write if the object moved underneath us.
                desired.metadata_mut().resource_version = live.metadata().resource_version.clone();
                self.store
                    .replace(&namespace, &name, &desired)
                    .await
                    .map_err(write_err)?;
                Ok(Applied::Updated)
            }
            Err(source) => Err(Error::Lookup {
                kind: K::KIND,
                namespace: namespace.clone(),
                name: name.clone(),
                source,
            }),
        }
    }
}

fn namespace_of(meta: &ObjectMeta) -> String {
    meta.namespace
        .clone()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

fn verb(applied: Applied) -> &'static str {
    match applied {
        Applied::Created => "Created",
        Applied::Updated => "Updated",
    }
}
