use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use perch_cloud::{
    CloudError, CredentialBroker, CredentialVendor, CustomerIdentity, IdentityResolver, Instance,
    InstanceState, Parameter, RegionClient, RegionClientFactory, RegionList, RegionScanner,
    ResourceLocator, Result, ScopedCredentials, StackDescription, StackEvent, StackRequest,
    StackStatus, TemplateSource, UserQuery, LocatorSettings,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const CUSTOMER_ID: &str = "5e4d3c2b-1a09-4f8e-9d7c-6b5a4f3e2d1c";
pub const CUSTOMER_EMAIL: &str = "a@example.com";
pub const BASTION_ID: &str = "0f1e2d3c-4b5a-4968-8776-655443322110";

/// Every backend call the fake saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindInstances { region: String },
    DescribeStacks { region: String, name: String },
    CreateStack { region: String, name: String },
    UpdateStack { region: String, name: String },
    DescribeEvents { region: String, name: String },
    Reboot { region: String, instance_id: String },
    Terminate { region: String, instance_id: String },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateStack { .. }
                | Call::UpdateStack { .. }
                | Call::Reboot { .. }
                | Call::Terminate { .. }
        )
    }
}

#[derive(Default)]
struct FakeState {
    stacks: HashMap<String, Vec<StackDescription>>,
    instances: HashMap<String, Vec<Instance>>,
    events: HashMap<String, Vec<StackEvent>>,
    /// Status sequence reported by successive describe calls, last one sticks
    status_script: HashMap<String, Vec<String>>,
    submitted: Vec<StackRequest>,
    calls: Vec<Call>,
    /// Regions whose queries fail with a transport error
    failing: HashMap<String, String>,
}

/// In-memory multi-region backend that records every call
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&self, region: &str, stack: StackDescription) {
        let mut state = self.state.lock().unwrap();
        state.stacks.entry(region.to_string()).or_default().push(stack);
    }

    pub fn add_instance(&self, region: &str, instance: Instance) {
        let mut state = self.state.lock().unwrap();
        state
            .instances
            .entry(region.to_string())
            .or_default()
            .push(instance);
    }

    pub fn set_events(&self, region: &str, events: Vec<StackEvent>) {
        let mut state = self.state.lock().unwrap();
        state.events.insert(region.to_string(), events);
    }

    pub fn script_statuses(&self, region: &str, statuses: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.status_script.insert(
            region.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Make every query against `region` fail with `CloudError::Api(message)`
    pub fn fail_region(&self, region: &str, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing.insert(region.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn query_count(&self) -> usize {
        self.calls().iter().filter(|c| !c.is_mutation()).count()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    pub fn submitted(&self) -> Vec<StackRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check_region(&self, region: &str) -> Result<()> {
        match self.state.lock().unwrap().failing.get(region) {
            Some(message) => Err(CloudError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

impl RegionClientFactory for FakeCloud {
    fn client(
        &self,
        _credentials: &ScopedCredentials,
        region: &str,
    ) -> Result<Box<dyn RegionClient>> {
        Ok(Box::new(FakeRegion {
            cloud: self.clone(),
            region: region.to_string(),
        }))
    }
}

struct FakeRegion {
    cloud: FakeCloud,
    region: String,
}

#[async_trait]
impl RegionClient for FakeRegion {
    fn region(&self) -> &str {
        &self.region
    }

    async fn find_tagged_instances(&self, key: &str, value: &str) -> Result<Vec<Instance>> {
        self.cloud.record(Call::FindInstances {
            region: self.region.clone(),
        });
        self.cloud.check_region(&self.region)?;
        let state = self.cloud.state.lock().unwrap();
        Ok(state
            .instances
            .get(&self.region)
            .map(|list| {
                list.iter()
                    .filter(|i| i.tag(key) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn describe_stacks(&self, name: &str) -> Result<Vec<StackDescription>> {
        self.cloud.record(Call::DescribeStacks {
            region: self.region.clone(),
            name: name.to_string(),
        });
        self.cloud.check_region(&self.region)?;
        let mut state = self.cloud.state.lock().unwrap();

        let next_status = state.status_script.get_mut(&self.region).and_then(|script| {
            if script.len() > 1 {
                Some(script.remove(0))
            } else {
                script.first().cloned()
            }
        });

        let mut stacks: Vec<StackDescription> = state
            .stacks
            .get(&self.region)
            .map(|list| list.iter().filter(|s| s.name == name).cloned().collect())
            .unwrap_or_default();
        if let Some(status) = next_status {
            for stack in &mut stacks {
                stack.status = StackStatus::new(status.clone());
            }
        }
        Ok(stacks)
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        self.cloud.record(Call::CreateStack {
            region: self.region.clone(),
            name: request.name.clone(),
        });
        let mut state = self.cloud.state.lock().unwrap();
        state.submitted.push(request.clone());
        Ok(format!("arn:fake:{}:{}", self.region, request.name))
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String> {
        self.cloud.record(Call::UpdateStack {
            region: self.region.clone(),
            name: request.name.clone(),
        });
        let mut state = self.cloud.state.lock().unwrap();
        state.submitted.push(request.clone());
        Ok(format!("arn:fake:{}:{}", self.region, request.name))
    }

    async fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>> {
        self.cloud.record(Call::DescribeEvents {
            region: self.region.clone(),
            name: name.to_string(),
        });
        let state = self.cloud.state.lock().unwrap();
        Ok(state.events.get(&self.region).cloned().unwrap_or_default())
    }

    async fn reboot_instance(&self, instance_id: &str) -> Result<()> {
        self.cloud.record(Call::Reboot {
            region: self.region.clone(),
            instance_id: instance_id.to_string(),
        });
        Ok(())
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        self.cloud.record(Call::Terminate {
            region: self.region.clone(),
            instance_id: instance_id.to_string(),
        });
        Ok(())
    }
}

/// Knows exactly one customer
pub struct FakeDirectory;

#[async_trait]
impl IdentityResolver for FakeDirectory {
    async fn resolve_user(&self, query: &UserQuery) -> Result<CustomerIdentity> {
        let known = match query {
            UserQuery::Email(email) => email == CUSTOMER_EMAIL,
            UserQuery::CustomerId(id) => id == CUSTOMER_ID,
        };
        if known {
            Ok(identity())
        } else {
            Err(CloudError::NotFound(format!("customer for {}", query)))
        }
    }
}

pub struct FakeVendor {
    pub credentials: Option<ScopedCredentials>,
}

#[async_trait]
impl CredentialVendor for FakeVendor {
    async fn scoped_credentials(
        &self,
        _identity: &CustomerIdentity,
    ) -> Result<Option<ScopedCredentials>> {
        Ok(self.credentials.clone())
    }
}

#[allow(dead_code)]
pub struct FakeTemplates;

#[async_trait]
impl TemplateSource for FakeTemplates {
    async fn fetch_template(&self, region: &str, name: &str) -> Result<Vec<u8>> {
        Ok(format!("{{\"Description\": \"{} for {}\"}}", name, region).into_bytes())
    }
}

pub fn identity() -> CustomerIdentity {
    CustomerIdentity {
        customer_id: CUSTOMER_ID.to_string(),
        email: CUSTOMER_EMAIL.to_string(),
        display_name: "Example Customer".to_string(),
    }
}

pub fn credentials() -> ScopedCredentials {
    ScopedCredentials::new("AKIAFAKEFAKEFAKE0000", "fake-secret", "fake-token")
}

pub fn locator(cloud: &FakeCloud, regions: &[&str], settings: LocatorSettings) -> ResourceLocator {
    let regions = RegionList::new(regions.iter().copied()).unwrap();
    ResourceLocator::new(
        Arc::new(FakeDirectory),
        CredentialBroker::new(Arc::new(FakeVendor {
            credentials: Some(credentials()),
        })),
        RegionScanner::new(regions, Arc::new(cloud.clone())),
        settings,
    )
}

#[allow(dead_code)]
pub fn stack(name: &str, status: &str, parameters: &[(&str, &str)]) -> StackDescription {
    StackDescription {
        stack_id: format!("arn:fake:{}", name),
        name: name.to_string(),
        status: StackStatus::new(status),
        status_reason: None,
        parameters: parameters
            .iter()
            .map(|(k, v)| Parameter::new(*k, *v))
            .collect(),
        tags: vec![],
    }
}

#[allow(dead_code)]
pub fn instance(instance_id: &str, state: InstanceState, bastion_id: &str) -> Instance {
    let mut tags = BTreeMap::new();
    tags.insert("CustomerId".to_string(), CUSTOMER_ID.to_string());
    tags.insert("BastionId".to_string(), bastion_id.to_string());
    Instance {
        instance_id: instance_id.to_string(),
        state,
        instance_type: Some("t2.micro".to_string()),
        launch_time: None,
        private_ip: None,
        public_ip: None,
        tags,
    }
}

#[allow(dead_code)]
pub fn event(minute: u32, status: &str) -> StackEvent {
    StackEvent {
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
        resource_status: status.to_string(),
        logical_resource_id: format!("Resource{}", minute),
        reason: None,
        physical_resource_id: None,
    }
}
