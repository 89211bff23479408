//! Internet-facing entry point for one composed service.

use crate::compose::context::Assembly;
use crate::compose::service::MeshPeer;
use crate::error::ComposeError;
use crate::model::{LoadBalancer, LoadBalancerListener, Output, TargetGroup};
use tracing::info;

/// Load balancer, listener and published output for a public service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicEntryPoint {
    pub load_balancer: String,
    pub listener: String,
    pub port: u16,
    pub target_group: String,
    pub target_port: u16,
    pub output: String,
    pub export_name: String,
}

impl PublicEntryPoint {
    /// Attach `target` behind a new internet-facing load balancer and publish
    /// the balancer's address. Returns the published output.
    pub fn attach(
        self,
        assembly: &mut Assembly,
        target: &impl MeshPeer,
    ) -> Result<Output, ComposeError> {
        let name = target.identity().name();
        let service = assembly
            .service(name)
            .filter(|s| &s.scheduler.execution_group == target.execution_group())
            .ok_or_else(|| ComposeError::UnknownTarget(name.to_string()))?;

        let target_group = TargetGroup {
            id: self.target_group,
            port: self.target_port,
            target_type: service.hosting.target_type(),
            service: service.scheduler.name.clone(),
            execution_group: service.scheduler.execution_group.clone(),
        };
        let lb = LoadBalancer {
            id: self.load_balancer,
            network: assembly.network().id.clone(),
            internet_facing: true,
            listeners: vec![LoadBalancerListener {
                id: self.listener,
                port: self.port,
                open: true,
                targets: vec![target_group],
            }],
        };
        let output = Output {
            id: self.output,
            export_name: self.export_name,
            value: lb.dns_name_ref(),
        };

        let lb_id = lb.id.clone();
        assembly.add_entry_point(lb, output.clone())?;
        info!(
            load_balancer = %lb_id,
            port = self.port,
            target = %name,
            "exposed public entry point"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{self, EXPORT_NAME};
    use crate::compose::{ContainerDescriptor, MeshService, ProcessDescriptor, ServiceProps};
    use crate::config::Settings;

    fn entry(load_balancer: &str, output: &str) -> PublicEntryPoint {
        PublicEntryPoint {
            load_balancer: load_balancer.into(),
            listener: "PublicListener".into(),
            port: 80,
            target_group: "greeter".into(),
            target_port: 80,
            output: output.into(),
            export_name: EXPORT_NAME.into(),
        }
    }

    #[test]
    fn failed_attach_leaves_assembly_unchanged() {
        let mut asm = assembly::infrastructure(&Settings::default());
        let greeter = MeshService::compose(
            &mut asm,
            ServiceProps {
                name: "greeter".into(),
                port: 3000,
                application: ProcessDescriptor::NodeHosted(
                    ContainerDescriptor::new("nathanpeck/greeter", 128)
                        .with_health_check(assembly::app_health_check(3000)),
                ),
            },
        )
        .unwrap();

        let output = entry("external", "ExternalDNS")
            .attach(&mut asm, &greeter)
            .unwrap();
        assert_eq!(output.value, "${external.DNSName}");

        let err = entry("external2", "ExternalDNS2")
            .attach(&mut asm, &greeter)
            .unwrap_err();
        assert_eq!(err, ComposeError::DuplicateOutput(EXPORT_NAME.into()));
        assert_eq!(asm.load_balancers().len(), 1);
        assert_eq!(asm.load_balancers()[0].id, "external");
        assert_eq!(asm.outputs().len(), 1);
    }
}
