use std::{path::Path, sync::Arc};

use crate::{
    configuration::CrawlerSettings,
    dal::place_db::PlaceStore,
    domain::{
        job::{CrawlOutcome, CrawlParameters, MatchMode},
        ledger::DedupLedger,
        location::{load_grid, load_locations, Location, SourceError, SubRegionFilter},
        pagination::{plan_for, GridPager, PageDecision, PaginationMode, RadiusLevel},
        place::{NormalizedRecord, RawRecord},
        query::{ExpandOptions, QueryCatalog, QueryVariant},
    },
    services::{
        export_sink::ExportWriter,
        job_controller::JobHandle,
        reference_data::{ReferenceData, RegionReference},
        serper_client::{PlacesProvider, SearchRequest},
    },
};

/// Everything a crawl needs besides its parameters. Built once at startup.
pub struct CrawlContext {
    pub provider: Arc<dyn PlacesProvider>,
    pub store: Arc<dyn PlaceStore>,
    pub reference: Arc<ReferenceData>,
    pub catalog: QueryCatalog,
    pub settings: CrawlerSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Unknown region '{0}'")]
    UnknownRegion(String),
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),
    #[error("Unknown sub-region '{0}'")]
    UnknownSubRegion(String),
    #[error("Region '{0}' has no grid table")]
    NoGridTable(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Failed to write export file: {0}")]
    Export(#[from] csv::Error),
    #[error("Failed to load known places: {0}")]
    Store(String),
}

/// Runs one job to completion. Records already written stay valid when an
/// error cuts the crawl short.
pub async fn run_crawl(
    params: &CrawlParameters,
    export_path: &Path,
    ctx: &CrawlContext,
    handle: &JobHandle,
) -> Result<CrawlOutcome, CrawlError> {
    let region = ctx
        .reference
        .region(&params.region)
        .ok_or_else(|| CrawlError::UnknownRegion(params.region.clone()))?;
    let variants = query_variants(params, &ctx.catalog)?;
    let locations = target_locations(params, region)?;

    let message = format!("Loaded {} target locations", locations.len());
    log::info!("{} for region {}", message, params.region);
    handle.update(|s| {
        s.set_plan(locations.len() * variants.len());
        s.status_message = message.clone();
        s.push_log(message);
    });

    let mut ledger = DedupLedger::new();
    let known_ids = ctx
        .store
        .known_ids(&params.region)
        .await
        .map_err(|e| CrawlError::Store(format!("{:#}", e)))?;
    log::info!(
        "Seeding ledger with {} known places for region {}",
        known_ids.len(),
        params.region
    );
    ledger.seed(known_ids);

    let mut run = CrawlRun {
        params,
        ctx,
        handle,
        country_code: &region.settings.country_code,
        ledger,
        export: ExportWriter::create(export_path)?,
        accepted: 0,
    };

    let outcome = run.crawl_all(&variants, &locations).await?;
    log::info!(
        "Crawl for '{}' ended as {:?}: {} rows in {}, {} places in ledger",
        params.subject(),
        outcome,
        run.export.rows(),
        run.export.path().display(),
        run.ledger.len()
    );
    Ok(outcome)
}

fn query_variants(
    params: &CrawlParameters,
    catalog: &QueryCatalog,
) -> Result<Vec<QueryVariant>, CrawlError> {
    if let Some(category) = &params.category {
        return catalog
            .bundle(category)
            .ok_or_else(|| CrawlError::UnknownCategory(category.clone()));
    }

    let options = ExpandOptions {
        include_translation: params.include_translation,
        include_broad: params.match_mode == MatchMode::LiteralAndBroad,
    };
    Ok(catalog.expand(params.search_term.as_deref().unwrap_or_default(), options))
}

fn target_locations(
    params: &CrawlParameters,
    region: &RegionReference,
) -> Result<Vec<Location>, CrawlError> {
    if let Some(classifier) = &region.classifier {
        if let Some(unknown) = params.sub_regions.iter().find(|c| !classifier.knows(c)) {
            return Err(CrawlError::UnknownSubRegion(unknown.clone()));
        }
    }

    let filter = SubRegionFilter {
        codes: &params.sub_regions,
        classifier: region.classifier.as_ref(),
    };

    match params.pagination {
        PaginationMode::Adaptive => Ok(load_locations(
            &params.region,
            &region.settings.locations_file,
            params.min_weight,
            &filter,
        )?),
        PaginationMode::Grid => {
            let grid_file = region
                .settings
                .grid_file
                .as_ref()
                .ok_or_else(|| CrawlError::NoGridTable(params.region.clone()))?;
            Ok(load_grid(&params.region, grid_file, &filter)?)
        }
    }
}

struct CrawlRun<'a> {
    params: &'a CrawlParameters,
    ctx: &'a CrawlContext,
    handle: &'a JobHandle,
    country_code: &'a str,
    ledger: DedupLedger,
    export: ExportWriter,
    accepted: u64,
}

impl CrawlRun<'_> {
    async fn crawl_all(
        &mut self,
        variants: &[QueryVariant],
        locations: &[Location],
    ) -> Result<CrawlOutcome, CrawlError> {
        for variant in variants {
            for location in locations {
                if let Some(outcome) = self.checkpoint() {
                    return Ok(outcome);
                }
                if let Some(outcome) = self.crawl_location(variant, location).await? {
                    return Ok(outcome);
                }
            }
        }

        Ok(match self.accepted >= self.params.target {
            true => CrawlOutcome::LimitReached,
            false => CrawlOutcome::Completed,
        })
    }

    fn checkpoint(&self) -> Option<CrawlOutcome> {
        if self.accepted >= self.params.target {
            return Some(CrawlOutcome::LimitReached);
        }
        if self.handle.stop_requested() {
            return Some(CrawlOutcome::Stopped);
        }
        None
    }

    async fn crawl_location(
        &mut self,
        variant: &QueryVariant,
        location: &Location,
    ) -> Result<Option<CrawlOutcome>, CrawlError> {
        self.handle.update(|s| s.begin_location(&location.label));

        let mut grid = GridPager::new(self.ctx.settings.grid_page_ceiling);
        let plan = match self.params.pagination {
            PaginationMode::Adaptive => plan_for(location.weight),
            PaginationMode::Grid => grid.plan(RadiusLevel(self.ctx.settings.grid_radius_level)),
        };
        let query = location.localized_query(&variant.text);

        for page in 0..plan.max_pages {
            if page > 0 {
                tokio::time::sleep(self.ctx.settings.page_delay()).await;
            }
            if let Some(outcome) = self.checkpoint() {
                return Ok(Some(outcome));
            }

            let request = SearchRequest {
                query: query.clone(),
                lat: location.lat,
                lon: location.lon,
                country_code: self.country_code.to_string(),
                page,
                radius: plan.radius,
            };
            let records = match self.ctx.provider.search(&request).await {
                Some(records) if !records.is_empty() => records,
                _ => break,
            };

            let fresh = self.absorb_page(records, variant, location).await?;
            if self.accepted >= self.params.target {
                return Ok(Some(CrawlOutcome::LimitReached));
            }
            let keep_paging = match self.params.pagination {
                PaginationMode::Adaptive => fresh > 0,
                PaginationMode::Grid => grid.record_page(fresh) == PageDecision::Continue,
            };
            if !keep_paging {
                break;
            }
        }

        if self.params.pagination == PaginationMode::Grid {
            log::debug!("Grid cell {} done after {} pages", location.label, grid.pages_issued());
        }
        self.handle.update(|s| s.finish_location());
        Ok(None)
    }

    /// Returns how many records on the page were new to the ledger.
    async fn absorb_page(
        &mut self,
        records: Vec<RawRecord>,
        variant: &QueryVariant,
        location: &Location,
    ) -> Result<usize, CrawlError> {
        let mut fresh = 0;

        for raw in records {
            if self.accepted >= self.params.target {
                break;
            }

            let Some(record) =
                NormalizedRecord::from_raw(raw, &self.params.region, &variant.text, location)
            else {
                log::debug!("Dropping place without identifier near {}", location.label);
                self.handle.update(|s| s.dropped += 1);
                continue;
            };
            if !self.ledger.accept(&record.place_id) {
                continue;
            }
            fresh += 1;

            if !self.params.thresholds.passes(&record) {
                self.handle.update(|s| s.skipped += 1);
                continue;
            }

            self.export.append(&record)?;
            if let Err(e) = self.ctx.store.upsert(&record).await {
                log::error!("Failed to store place {}: {:?}", record.place_id, e);
            }
            self.accepted += 1;

            let line = format!("{} ({})", record.name, location.label);
            log::info!("Accepted {}", line);
            let accepted = self.accepted;
            self.handle.update(|s| {
                s.total_leads = accepted;
                s.push_log(line);
            });
        }

        Ok(fresh)
    }
}
