use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};
use std::fmt::Debug;

/// Namespaced API objects the controller reads and writes.
pub trait NamespacedObject:
    k8s_openapi::Resource<Scope = NamespaceResourceScope>
    + k8s_openapi::Metadata<Ty = ObjectMeta>
    + serde::de::DeserializeOwned
    + serde::Serialize
    + Clone
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<T> NamespacedObject for T where
    T: k8s_openapi::Resource<Scope = NamespaceResourceScope>
        + k8s_openapi::Metadata<Ty = ObjectMeta>
        + serde::de::DeserializeOwned
        + serde::Serialize
        + Clone
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// One page of a list response.
#[derive(Debug, Clone)]
pub struct Page<K> {
    pub items: Vec<K>,
    /// Set when the server has more results.
    pub continue_token: Option<String>,
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an object, `None` if it does not exist.
    async fn get<K: NamespacedObject>(&self, namespace: &str, name: &str) -> kube::Result<Option<K>>;

    async fn create<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> kube::Result<K>;

    async fn replace<K: NamespacedObject>(
        &self,
        namespace: &str,
        name: &str,
        obj: &K,
    ) -> kube::Result<K>;

    async fn list<K: NamespacedObject>(
        &self,
        namespace: &str,
        selector: &str,
        limit: u32,
        continue_token: Option<&str>,
    ) -> kube::Result<Page<K>>;
}

/// `ResourceStore` backed by the API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: NamespacedObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: NamespacedObject>(&self, namespace: &str, name: &str) -> kube::Result<Option<K>> {
        match self.api::<K>(namespace).get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create<K: NamespacedObject>(&self, namespace: &str, obj: &K) -> kube::Result<K> {
        self.api::<K>(namespace)
            .create(&PostParams::default(), obj)
            .await
    }

    async fn replace<K: NamespacedObject>(
        &self,
        namespace: &str,
        name: &str,
        obj: &K,
    ) -> kube::Result<K> {
        self.api::<K>(namespace)
            .replace(name, &PostParams::default(), obj)
            .await
    }

    async fn list<K: NamespacedObject>(
        &self,
        namespace: &str,
        selector: &str,
        limit: u32,
        continue_token: Option<&str>,
    ) -> kube::Result<Page<K>> {
        let mut lp = ListParams::default().labels(selector).limit(limit);
        if let Some(token) = continue_token {
            lp = lp.continue_token(token);
        }
        let list = self.api::<K>(namespace).list(&lp).await?;
        let continue_token = list.metadata.continue_.filter(|t| !t.is_empty());
        Ok(Page {
            items: list.items,
            continue_token,
        })
    }
}
