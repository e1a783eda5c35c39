use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types as ec2;
use aws_sdk_eks::types::VpcConfigRequest;
use tracing::{debug, info};

use crate::types::{
    ClusterInfo, ClusterSpec, InstanceDescriptor, InstanceFilter, InstanceId, InstanceState,
    Reservation,
};
use crate::{ClusterProvider, Error, InstanceProvider, Result};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// AWS provider backed by the official SDK.
///
/// EKS calls use the region resolved at construction. EC2 calls take the
/// region per request, so one provider can reach worker nodes anywhere.
pub struct AwsProvider {
    sdk_config: SdkConfig,
    eks: aws_sdk_eks::Client,
}

impl AwsProvider {
    /// Load the AWS default credential/region chain.
    ///
    /// - `region` overrides `AWS_REGION` / the shared config file when given
    /// - `CHAOS_EKS_AWS_MAX_ATTEMPTS` (default: `3`) sets the SDK's standard retry attempts
    pub async fn from_env(region: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let max_attempts = std::env::var("CHAOS_EKS_AWS_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(max_attempts));
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        let resolved = sdk_config
            .region()
            .ok_or_else(|| Error::MissingEnv("AWS_REGION".into()))?;
        info!(region = %resolved, max_attempts, "aws: provider configured");

        Ok(Self {
            eks: aws_sdk_eks::Client::new(&sdk_config),
            sdk_config,
        })
    }

    fn ec2_client(&self, region: &str) -> aws_sdk_ec2::Client {
        let config = aws_sdk_ec2::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_ec2::Client::from_conf(config)
    }

    fn ec2_filter(filter: &InstanceFilter) -> ec2::Filter {
        ec2::Filter::builder()
            .name(&filter.name)
            .set_values(Some(filter.values.clone()))
            .build()
    }

    fn descriptor(instance: &ec2::Instance) -> Result<InstanceDescriptor> {
        let instance_id = instance
            .instance_id()
            .ok_or(Error::MissingField("Instances[].InstanceId"))?;

        let state = instance
            .state()
            .and_then(|s| s.name())
            .map(|name| InstanceState::parse(name.as_str()))
            .unwrap_or(InstanceState::Unknown);

        let group_names = instance
            .network_interfaces()
            .iter()
            .flat_map(|ni| ni.groups())
            .filter_map(|g| g.group_name())
            .map(str::to_string)
            .collect();

        Ok(InstanceDescriptor {
            instance_id: InstanceId(instance_id.to_string()),
            state,
            group_names,
        })
    }

    fn reservation(reservation: &ec2::Reservation) -> Result<Reservation> {
        let instances = reservation
            .instances()
            .iter()
            .map(Self::descriptor)
            .collect::<Result<Vec<_>>>()?;
        Ok(Reservation { instances })
    }

    fn cluster_info(fallback_name: &str, cluster: &aws_sdk_eks::types::Cluster) -> ClusterInfo {
        ClusterInfo {
            name: cluster.name().unwrap_or(fallback_name).to_string(),
            arn: cluster.arn().map(str::to_string),
            status: cluster.status().map(|s| s.as_str().to_string()),
        }
    }
}

#[async_trait]
impl ClusterProvider for AwsProvider {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<ClusterInfo> {
        let vpc = VpcConfigRequest::builder()
            .set_subnet_ids(Some(spec.vpc_config.subnet_ids.clone()))
            .set_security_group_ids(Some(spec.vpc_config.security_group_ids.clone()))
            .set_endpoint_public_access(spec.vpc_config.endpoint_public_access)
            .set_endpoint_private_access(spec.vpc_config.endpoint_private_access)
            .build();

        let resp = self
            .eks
            .create_cluster()
            .name(&spec.name)
            .role_arn(&spec.role_arn)
            .set_version(spec.version.clone())
            .resources_vpc_config(vpc)
            .send()
            .await
            .map_err(|e| Error::EksApi(format!("create cluster: {}", DisplayErrorContext(&e))))?;

        let cluster = resp.cluster().ok_or(Error::MissingField("cluster"))?;
        let info = Self::cluster_info(&spec.name, cluster);

        info!(cluster = %info.name, status = ?info.status, "aws: cluster creation requested");
        Ok(info)
    }

    async fn delete_cluster(&self, name: &str) -> Result<ClusterInfo> {
        let resp = self
            .eks
            .delete_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| Error::EksApi(format!("delete cluster: {}", DisplayErrorContext(&e))))?;

        let cluster = resp.cluster().ok_or(Error::MissingField("cluster"))?;
        let info = Self::cluster_info(name, cluster);

        info!(cluster = %info.name, status = ?info.status, "aws: cluster deletion requested");
        Ok(info)
    }
}

#[async_trait]
impl InstanceProvider for AwsProvider {
    async fn describe_instances(
        &self,
        region: &str,
        filters: &[InstanceFilter],
    ) -> Result<Vec<Reservation>> {
        let client = self.ec2_client(region);
        let filters: Vec<ec2::Filter> = filters.iter().map(Self::ec2_filter).collect();

        let mut reservations = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = client
                .describe_instances()
                .set_filters(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    Error::Ec2Api(format!("describe instances: {}", DisplayErrorContext(&e)))
                })?;

            for reservation in resp.reservations() {
                reservations.push(Self::reservation(reservation)?);
            }

            match resp.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(region, reservations = reservations.len(), "aws: described instances");
        Ok(reservations)
    }

    async fn terminate_instance(&self, region: &str, id: &InstanceId) -> Result<()> {
        self.ec2_client(region)
            .terminate_instances()
            .instance_ids(id.0.clone())
            .send()
            .await
            .map_err(|e| {
                Error::Ec2Api(format!("terminate instance {id}: {}", DisplayErrorContext(&e)))
            })?;

        info!(instance_id = %id, region, "aws: termination requested");
        Ok(())
    }
}
