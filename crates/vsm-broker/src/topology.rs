//! Topology Declarator: declares exchanges, queues, and bindings at
//! startup. Declarations are idempotent — safe to run on every boot.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::ExchangeKind;

use crate::error::BrokerError;
use crate::pool::Lease;

const DEFAULT_QUEUE_TTL_MS: i64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
pub struct ExchangeSpec {
    pub name: &'static str,
    pub kind: ExchangeKindSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKindSpec {
    Fanout,
    Topic,
    Direct,
}

impl ExchangeKindSpec {
    fn to_lapin(self) -> ExchangeKind {
        match self {
            ExchangeKindSpec::Fanout => ExchangeKind::Fanout,
            ExchangeKindSpec::Topic => ExchangeKind::Topic,
            ExchangeKindSpec::Direct => ExchangeKind::Direct,
        }
    }
}

/// The fixed exchange set .
pub const EXCHANGES: &[ExchangeSpec] = &[
    ExchangeSpec { name: "vsm.algedonic", kind: ExchangeKindSpec::Fanout },
    ExchangeSpec { name: "vsm.policy", kind: ExchangeKindSpec::Fanout },
    ExchangeSpec { name: "vsm.intelligence", kind: ExchangeKindSpec::Topic },
    ExchangeSpec { name: "vsm.control", kind: ExchangeKindSpec::Topic },
    ExchangeSpec { name: "vsm.recursive", kind: ExchangeKindSpec::Topic },
    ExchangeSpec { name: "vsm.s1.commands", kind: ExchangeKindSpec::Topic },
    ExchangeSpec { name: "vsm.audit", kind: ExchangeKindSpec::Direct },
];

pub struct TopologyDeclarator;

impl TopologyDeclarator {
    /// Declare the fixed topology. Per-agent exchanges/queues are declared
    /// separately by each agent on startup.
    pub async fn declare_fixed_topology(lease: &Lease) -> Result<(), BrokerError> {
        let channel = lease.channel();
        for spec in EXCHANGES {
            channel
                .exchange_declare(
                    spec.name,
                    spec.kind.to_lapin(),
                    ExchangeDeclareOptions { durable: true, ..Default::default() },
                    FieldTable::default(),
                )
                .await
                .map_err(BrokerError::Lapin)?;
        }

        Self::declare_durable_queue(lease, "vsm.system5.policy", None).await?;
        Self::declare_durable_queue(lease, "vsm.system4.intelligence", None).await?;
        Self::declare_durable_queue(lease, "vsm.system3.control", None).await?;
        Self::declare_durable_queue(lease, "vsm.audit.responses", None).await?;

        channel
            .queue_bind(
                "vsm.system5.policy",
                "vsm.policy",
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::Lapin)?;

        Ok(())
    }

    /// Declare the per-agent command queue and result exchange.
    pub async fn declare_agent_topology(lease: &Lease, agent_id: &str, capabilities: &[String]) -> Result<(), BrokerError> {
        let channel = lease.channel();
        let command_queue = format!("vsm.s1.{agent_id}.command");
        let results_exchange = format!("vsm.s1.{agent_id}.results");

        Self::declare_durable_queue(lease, &command_queue, None).await?;

        channel
            .exchange_declare(
                &results_exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::Lapin)?;

        channel
            .queue_bind(
                &command_queue,
                "vsm.s1.commands",
                &format!("agent.{agent_id}"),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::Lapin)?;

        for cap in capabilities {
            channel
                .queue_bind(
                    &command_queue,
                    "vsm.s1.commands",
                    &format!("capability.{cap}"),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(BrokerError::Lapin)?;
        }

        channel
            .queue_bind(
                &command_queue,
                "vsm.s1.commands",
                "broadcast",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::Lapin)?;

        Ok(())
    }

    /// Declare the resident control-plane process' own command queue, bound
    /// to a fixed set of well-known capability names. Unlike
    /// `declare_agent_topology` this queue isn't bound to any `agent.<id>`
    /// or `broadcast` routing key — it exists so the process itself can
    /// answer RPCs addressed to capabilities it implements directly
    /// (supervisor, registry, governance), rather than a supervised agent.
    pub async fn declare_capability_topology(lease: &Lease, queue: &str, capability_names: &[&str]) -> Result<(), BrokerError> {
        let channel = lease.channel();
        Self::declare_durable_queue(lease, queue, None).await?;

        for name in capability_names {
            channel
                .queue_bind(
                    queue,
                    "vsm.s1.commands",
                    &format!("capability.{name}"),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(BrokerError::Lapin)?;
        }
        Ok(())
    }

    /// Declare a meta-VSM's addressed queue.
    pub async fn declare_meta_topology(lease: &Lease, identity: &str) -> Result<(), BrokerError> {
        let queue = format!("vsm.meta.{identity}");
        Self::declare_durable_queue(lease, &queue, None).await?;
        lease
            .channel()
            .queue_bind(
                &queue,
                "vsm.recursive",
                &format!("meta.{identity}"),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::Lapin)?;
        Ok(())
    }

    async fn declare_durable_queue(lease: &Lease, name: &str, ttl_ms: Option<i64>) -> Result<(), BrokerError> {
        let mut args = FieldTable::default();
        args.insert(
            "x-message-ttl".into(),
            AMQPValue::LongInt(ttl_ms.unwrap_or(DEFAULT_QUEUE_TTL_MS) as i32),
        );
        args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString(format!("{name}.dlx").into()));

        lease
            .channel()
            .queue_declare(name, QueueDeclareOptions { durable: true, ..Default::default() }, args)
            .await
            .map_err(BrokerError::Lapin)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_exchange_set_has_seven_entries() {
        let names: Vec<_> = EXCHANGES.iter().map(|e| e.name).collect();
        assert!(names.contains(&"vsm.algedonic"));
        assert!(names.contains(&"vsm.policy"));
        assert!(names.contains(&"vsm.audit"));
        assert_eq!(EXCHANGES.len(), 7);
    }

    #[test]
    fn algedonic_and_policy_are_fanout() {
        let algedonic = EXCHANGES.iter().find(|e| e.name == "vsm.algedonic").unwrap();
        assert_eq!(algedonic.kind, ExchangeKindSpec::Fanout);
        let audit = EXCHANGES.iter().find(|e| e.name == "vsm.audit").unwrap();
        assert_eq!(audit.kind, ExchangeKindSpec::Direct);
    }
}
