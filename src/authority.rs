//! Custom Hickory DNS authority backed by the host table.
//!
//! The authority is registered at the root so it sees every query, then
//! decides per name:
//!
//! ```text
//! name in host table            → A/AAAA records (NODATA if no address of that family)
//! local domain apex             → SOA/NS, NODATA for other types
//! name under a local domain     → NXDOMAIN
//! anything else                 → REFUSED (never forwarded)
//! ```

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA, NS, SOA};
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::DnsConfig;
use crate::hosts::ResolverConfig;
use crate::metrics::{self, QueryResult, Timer};
use crate::state::HostTable;

/// Authority answering A/AAAA queries from the host table.
pub struct HostsAuthority {
    origin: LowerName,
    table: HostTable,
    config: Arc<DnsConfig>,
}

impl HostsAuthority {
    /// Create a new authority for the given configuration and table.
    pub fn new(config: DnsConfig, table: HostTable) -> Self {
        Self {
            origin: LowerName::from(Name::root()),
            table,
            config: Arc::new(config),
        }
    }

    /// Build A or AAAA records for the addresses matching `rtype`.
    fn build_address_records(&self, name: Name, rtype: RecordType, ips: &[IpAddr]) -> RecordSet {
        let mut record_set = RecordSet::new(name.clone(), rtype, 0);

        for ip in ips {
            let rdata = match (rtype, ip) {
                (RecordType::A, IpAddr::V4(v4)) => RData::A(A::from(*v4)),
                (RecordType::AAAA, IpAddr::V6(v6)) => RData::AAAA(AAAA::from(*v6)),
                _ => continue,
            };
            let mut record = Record::from_rdata(name.clone(), self.config.ttl, rdata);
            record.set_dns_class(DNSClass::IN);
            record_set.insert(record, 0);
        }

        record_set
    }

    /// Build the SOA record for a local zone.
    fn build_soa_record(&self, zone: Name) -> RecordSet {
        let soa = SOA::new(
            Name::from_ascii(&self.config.soa.mname).unwrap_or_else(|_| Name::root()),
            Name::from_ascii(&self.config.soa.rname).unwrap_or_else(|_| Name::root()),
            self.table.serial(),
            self.config.soa.refresh as i32,
            self.config.soa.retry as i32,
            self.config.soa.expire as i32,
            self.config.soa.minimum,
        );

        let mut record_set = RecordSet::new(zone.clone(), RecordType::SOA, 0);
        let mut record = Record::from_rdata(zone, self.config.ttl, RData::SOA(soa));
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);

        record_set
    }

    /// Build an NS record for a local zone.
    fn build_ns_record(&self, zone: Name) -> RecordSet {
        let ns_name = Name::from_ascii(&self.config.soa.mname).unwrap_or_else(|_| Name::root());

        let mut record_set = RecordSet::new(zone.clone(), RecordType::NS, 0);
        let mut record = Record::from_rdata(zone, self.config.ttl, RData::NS(NS(ns_name)));
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);

        record_set
    }

    /// Answer for a name with no host record.
    fn not_found(
        &self,
        snapshot: &ResolverConfig,
        name: &LowerName,
        rtype_str: &str,
        timer: &Timer,
    ) -> LookupControlFlow<LookupRecords> {
        if snapshot.is_local(name) {
            debug!(%name, "lookup: no records found");
            metrics::record_query(rtype_str, QueryResult::NxDomain, timer.elapsed());
            LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
        } else {
            debug!(%name, "lookup: name outside local domains, refusing");
            metrics::record_query(rtype_str, QueryResult::Refused, timer.elapsed());
            LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::Refused)))
        }
    }
}

#[async_trait]
impl Authority for HostsAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let timer = Timer::start();
        let rtype_str = format!("{:?}", rtype);
        let snapshot = self.table.snapshot();

        trace!(%name, rtype = ?rtype, "DNS lookup");

        match rtype {
            RecordType::A | RecordType::AAAA => {
                let Some(ips) = snapshot.lookup(name) else {
                    if snapshot.is_local_apex(name) {
                        debug!(%name, rtype = ?rtype, "lookup: zone apex has no addresses");
                        metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                        return LookupControlFlow::Break(Err(LookupError::NameExists));
                    }
                    return self.not_found(&snapshot, name, &rtype_str, &timer);
                };

                let count = ips
                    .iter()
                    .filter(|ip| match rtype {
                        RecordType::A => ip.is_ipv4(),
                        _ => ip.is_ipv6(),
                    })
                    .count();
                if count == 0 {
                    debug!(%name, rtype = ?rtype, "lookup: no address of requested family");
                    metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                    return LookupControlFlow::Break(Err(LookupError::NameExists));
                }

                debug!(%name, count, "lookup: returning records");
                metrics::record_ips_returned(count);
                metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                let record_set =
                    Arc::new(self.build_address_records(Name::from(name.clone()), rtype, ips));
                LookupControlFlow::Break(Ok(LookupRecords::new(lookup_options, record_set)))
            }
            RecordType::SOA | RecordType::NS => {
                // The catalog asks the origin (root) for the SOA it attaches
                // to negative answers; hand it the primary local zone's.
                let zone = if snapshot.is_local_apex(name) {
                    Some(name.clone())
                } else if name.is_root() && rtype == RecordType::SOA {
                    snapshot.local_domains().first().cloned()
                } else {
                    None
                };

                match zone {
                    Some(zone) => {
                        debug!(%name, rtype = ?rtype, "zone apex lookup");
                        metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                        let zone = Name::from(zone);
                        let record_set = if rtype == RecordType::SOA {
                            self.build_soa_record(zone)
                        } else {
                            self.build_ns_record(zone)
                        };
                        LookupControlFlow::Break(Ok(LookupRecords::new(
                            lookup_options,
                            Arc::new(record_set),
                        )))
                    }
                    None if snapshot.lookup(name).is_some() => {
                        metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                        LookupControlFlow::Break(Err(LookupError::NameExists))
                    }
                    None => self.not_found(&snapshot, name, &rtype_str, &timer),
                }
            }
            _ => {
                if snapshot.lookup(name).is_some() || snapshot.is_local_apex(name) {
                    trace!(%name, rtype = ?rtype, "unsupported record type for known name");
                    metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                    LookupControlFlow::Break(Err(LookupError::NameExists))
                } else {
                    self.not_found(&snapshot, name, &rtype_str, &timer)
                }
            }
        }
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        trace!(src = %request_info.src, "DNS search");
        self.lookup(
            request_info.query.name(),
            request_info.query.query_type(),
            lookup_options,
        )
        .await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}
