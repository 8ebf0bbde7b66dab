//! Unit-specific process logic.
//!
//! Each module kind is a variant of [`Unit`]; the process phase dispatches via
//! enum match. Most units move no events themselves: they configure outlet
//! flow fractions and leave the physical movement to the sockets.

use crate::event::Event;
use crate::fixed::{Fixed64, clamp_unit, ratio_or_zero};
use crate::id::{SocketId, SpeciesId};
use crate::module::ModuleError;
use crate::queue::{EventQueue, QueueSnapshot};
use crate::socket::{Capacity, FlowError, Socket, homogenized};
use crate::species::{Phase, SpeciesRegistry};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Unit variants
// ---------------------------------------------------------------------------

/// Event generation shared by sources and tanks.
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    /// Events emitted per iteration.
    pub event_rate: u32,
    /// Normalised volumetric fraction per species, indexed by `SpeciesId`.
    fractions: Vec<Fixed64>,
}

impl Generator {
    /// Build a generator. With no fractions every registered species gets an
    /// equal share; given fractions are normalised to sum to one.
    pub fn new(
        registry: &SpeciesRegistry,
        event_rate: u32,
        volumetric_fractions: Option<&[(SpeciesId, Fixed64)]>,
    ) -> Result<Self, ModuleError> {
        if event_rate == 0 {
            return Err(ModuleError::ZeroEventRate);
        }
        if registry.is_empty() {
            return Err(ModuleError::NoSpeciesRegistered);
        }
        let fractions = match volumetric_fractions {
            None => {
                let share = ratio_or_zero(Fixed64::ONE, Fixed64::saturating_from_num(registry.len()));
                vec![share; registry.len()]
            }
            Some(given) => {
                let mut raw = registry.zeroed();
                for &(species, fraction) in given {
                    if !registry.contains(species) {
                        return Err(ModuleError::UnknownSpecies(species));
                    }
                    if fraction < Fixed64::ZERO {
                        return Err(ModuleError::NegativeFraction { species, fraction });
                    }
                    raw[species.index()] = fraction;
                }
                let sum: Fixed64 = raw.iter().copied().sum();
                if sum == Fixed64::ZERO {
                    return Err(ModuleError::ZeroFractionSum);
                }
                raw.iter().map(|f| ratio_or_zero(*f, sum)).collect()
            }
        };
        Ok(Self {
            event_rate,
            fractions,
        })
    }

    pub fn fractions(&self) -> &[Fixed64] {
        &self.fractions
    }

    /// Fill `outlet` up to its capacity with `event_rate` equal events.
    /// An unbounded outlet generates nothing. Returns the generated volume.
    fn generate(&self, outlet: &mut Socket) -> Result<Fixed64, FlowError> {
        let Some(total) = outlet.capacity.remaining(outlet.queue.aggregate_volume()) else {
            return Ok(Fixed64::ZERO);
        };
        if total == Fixed64::ZERO {
            return Ok(Fixed64::ZERO);
        }
        let mut targets: Vec<Fixed64> = self
            .fractions
            .iter()
            .map(|f| total.saturating_mul(*f))
            .collect();
        // The last species with a share absorbs rounding so the total is exact.
        if let Some(last) = self.fractions.iter().rposition(|f| *f > Fixed64::ZERO) {
            let others: Fixed64 = targets
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != last)
                .map(|(_, t)| *t)
                .sum();
            targets[last] = (total - others).max(Fixed64::ZERO);
        }
        for volumes in homogenized(&targets, self.event_rate) {
            outlet.queue.enqueue(Event::from_volumes(volumes))?;
        }
        Ok(total)
    }
}

/// Passive unit with a blended push/pull inlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pump {
    pub capacity: Capacity,
}

/// Two-way proportional splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splitter {
    /// Share of every species routed to the first outlet.
    pub split: Fixed64,
}

/// Phase-aware separator with an accepts outlet (0) and a rejects outlet (1).
#[derive(Debug, Clone, PartialEq)]
pub struct Hydrocyclone {
    /// Volumetric reject rate applied to liquids.
    pub rrv: Fixed64,
    /// Mass reject rate applied to solids.
    pub rrw: Fixed64,
    rejects_fractions: Vec<Fixed64>,
}

impl Hydrocyclone {
    pub fn new(rrv: Fixed64, rrw: Fixed64) -> Self {
        Self {
            rrv,
            rrw,
            rejects_fractions: Vec::new(),
        }
    }

    /// Per-species rejects fraction from the last process phase.
    pub fn rejects_fractions(&self) -> &[Fixed64] {
        &self.rejects_fractions
    }

    /// Per-species accepts fraction from the last process phase.
    pub fn accepts_fractions(&self) -> Vec<Fixed64> {
        self.rejects_fractions
            .iter()
            .map(|r| Fixed64::ONE - *r)
            .collect()
    }

    /// Compute per-species rejects fractions for the given feed.
    ///
    /// Liquids: `rrv` of the total liquid feed is rejected, apportioned by
    /// each liquid's share of it. Solids: `rrw` of each solid's mass is
    /// rejected, converted back to volume. Gases always pass to accepts.
    /// A species with no feed rejects nothing.
    pub fn separate(&mut self, registry: &SpeciesRegistry, feed: &[Fixed64]) -> &[Fixed64] {
        let volume_of = |id: SpeciesId| feed.get(id.index()).copied().unwrap_or(Fixed64::ZERO);
        let liquid_feed: Fixed64 = registry
            .iter()
            .filter(|(_, s)| s.phase == Phase::Liquid)
            .map(|(id, _)| volume_of(id))
            .sum();
        let liquid_rejects = self.rrv.saturating_mul(liquid_feed);

        self.rejects_fractions = registry
            .iter()
            .map(|(id, species)| {
                let v = volume_of(id);
                let rejects = match species.phase {
                    Phase::Liquid => liquid_rejects.saturating_mul(ratio_or_zero(v, liquid_feed)),
                    Phase::Solid => species.volume_of(self.rrw.saturating_mul(species.mass_of(v))),
                    Phase::Gas => Fixed64::ZERO,
                };
                clamp_unit(ratio_or_zero(rejects, v))
            })
            .collect();
        &self.rejects_fractions
    }
}

/// Material exit point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sink {
    /// Volume purged since construction.
    pub consumed: Fixed64,
}

/// Closed set of process units. Dispatches via enum match.
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    Source(Generator),
    Tank(Generator),
    Pump(Pump),
    Splitter(Splitter),
    Joiner,
    Hydrocyclone(Hydrocyclone),
    Sink(Sink),
}

// ---------------------------------------------------------------------------
// Process phase
// ---------------------------------------------------------------------------

/// Mutable view of one module handed to [`Unit::process`].
pub struct UnitContext<'a> {
    pub registry: &'a SpeciesRegistry,
    /// The module's internal queue.
    pub queue: &'a mut EventQueue,
    /// Module queue contents captured at the end of preprocess.
    pub snapshot: &'a QueueSnapshot,
    pub outlets: &'a [SocketId],
    pub sockets: &'a mut SlotMap<SocketId, Socket>,
}

impl UnitContext<'_> {
    fn outlet(&mut self, index: usize) -> Result<Option<&mut Socket>, FlowError> {
        let Some(&id) = self.outlets.get(index) else {
            return Ok(None);
        };
        self.sockets
            .get_mut(id)
            .map(Some)
            .ok_or(FlowError::UnknownSocket(id))
    }
}

/// What a unit did during one process phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnitResult {
    /// Volume created by a generator.
    pub generated: Fixed64,
    /// Volume removed from the network.
    pub consumed: Fixed64,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Source(_) => "source",
            Unit::Tank(_) => "tank",
            Unit::Pump(_) => "pump",
            Unit::Splitter(_) => "splitter",
            Unit::Joiner => "joiner",
            Unit::Hydrocyclone(_) => "hydrocyclone",
            Unit::Sink(_) => "sink",
        }
    }

    pub fn process(&mut self, ctx: &mut UnitContext<'_>) -> Result<UnitResult, FlowError> {
        let mut result = UnitResult::default();
        match self {
            Unit::Source(generator) | Unit::Tank(generator) => {
                if let Some(outlet) = ctx.outlet(0)? {
                    result.generated = generator.generate(outlet)?;
                }
            }
            Unit::Pump(_) | Unit::Joiner => {}
            Unit::Splitter(splitter) => {
                let width = ctx.registry.len();
                let split = splitter.split;
                if let Some(first) = ctx.outlet(0)? {
                    first.set_flow_fractions(vec![split; width]);
                }
                if let Some(second) = ctx.outlet(1)? {
                    second.set_flow_fractions(vec![Fixed64::ONE - split; width]);
                }
            }
            Unit::Hydrocyclone(cyclone) => {
                cyclone.separate(ctx.registry, &ctx.snapshot.species_volumes);
                let rejects = cyclone.rejects_fractions().to_vec();
                if let Some(accepts) = ctx.outlet(0)? {
                    accepts.set_flow_fractions(cyclone.accepts_fractions());
                }
                if let Some(rejected) = ctx.outlet(1)? {
                    rejected.set_flow_fractions(rejects);
                }
            }
            Unit::Sink(sink) => {
                let purged = ctx.queue.purge();
                // Lifetime total; pins at the fixed-point maximum.
                sink.consumed = sink.consumed.saturating_add(purged);
                result.consumed = purged;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ModuleId;
    use crate::socket::SocketKind;
    use crate::test_utils::*;

    fn outlet(capacity: Capacity) -> Socket {
        Socket::new(ModuleId::default(), "out", SocketKind::PushOutlet, capacity)
    }

    #[test]
    fn generator_rejects_zero_rate() {
        let reg = water_fiber_registry();
        assert_eq!(
            Generator::new(&reg, 0, None).unwrap_err(),
            ModuleError::ZeroEventRate
        );
    }

    #[test]
    fn generator_validates_fractions() {
        let reg = water_fiber_registry();
        assert!(matches!(
            Generator::new(&reg, 1, Some(&[(water(), fixed(-0.5))])),
            Err(ModuleError::NegativeFraction { .. })
        ));
        assert_eq!(
            Generator::new(&reg, 1, Some(&[(SpeciesId(7), fixed(1.0))])).unwrap_err(),
            ModuleError::UnknownSpecies(SpeciesId(7))
        );
        assert_eq!(
            Generator::new(&reg, 1, Some(&[(water(), Fixed64::ZERO)])).unwrap_err(),
            ModuleError::ZeroFractionSum
        );
    }

    #[test]
    fn generator_normalises_fractions() {
        let reg = water_fiber_registry();
        let g = Generator::new(&reg, 1, Some(&[(water(), fixed(3.0)), (fiber(), fixed(1.0))])).unwrap();
        assert_eq!(g.fractions(), &[fixed(0.75), fixed(0.25)]);
    }

    #[test]
    fn generate_fills_capacity_uniformly() {
        let reg = water_fiber_registry();
        let g = Generator::new(&reg, 4, None).unwrap();
        let mut out = outlet(bounded(100.0));
        assert_eq!(g.generate(&mut out).unwrap(), fixed(100.0));
        assert_eq!(out.queue.len(), 4);
        assert_eq!(out.queue.species_volume(water()), fixed(50.0));
        assert_eq!(out.queue.species_volume(fiber()), fixed(50.0));
        assert_eq!(out.queue.peek().unwrap().aggregate_volume(), fixed(25.0));
    }

    #[test]
    fn generate_tops_up_backlog_only() {
        let reg = water_fiber_registry();
        let g = Generator::new(&reg, 1, Some(&[(water(), fixed(1.0))])).unwrap();
        let mut out = outlet(bounded(10.0));
        out.queue.enqueue(water_event(&reg, 4.0)).unwrap();
        assert_eq!(g.generate(&mut out).unwrap(), fixed(6.0));
        assert_eq!(out.queue.aggregate_volume(), fixed(10.0));
    }

    #[test]
    fn generate_unbounded_is_noop() {
        let reg = water_fiber_registry();
        let g = Generator::new(&reg, 3, None).unwrap();
        let mut out = outlet(Capacity::Unbounded);
        assert_eq!(g.generate(&mut out).unwrap(), Fixed64::ZERO);
        assert!(out.queue.is_empty());
    }

    #[test]
    fn hydrocyclone_zero_feed_accepts_everything() {
        let reg = water_fiber_registry();
        let mut h = Hydrocyclone::new(fixed(0.1), fixed(0.8));
        let rejects = h.separate(&reg, &reg.zeroed()).to_vec();
        assert_eq!(rejects, vec![Fixed64::ZERO, Fixed64::ZERO]);
        assert_eq!(h.accepts_fractions(), vec![Fixed64::ONE, Fixed64::ONE]);
    }

    #[test]
    fn hydrocyclone_separates_by_phase() {
        let reg = water_fiber_registry();
        let mut h = Hydrocyclone::new(fixed(0.25), fixed(0.5));
        let rejects = h.separate(&reg, &[fixed(80.0), fixed(20.0)]).to_vec();
        assert_eq!(rejects[water().index()], fixed(0.25));
        // Mass round trip through density loses at most a few ulps.
        let fiber_rejects = rejects[fiber().index()];
        assert!((fiber_rejects - fixed(0.5)).abs() < fixed(1e-6));
    }

    #[test]
    fn sink_accumulates_consumed() {
        let reg = water_fiber_registry();
        let mut unit = Unit::Sink(Sink::default());
        let mut queue = EventQueue::new();
        queue.enqueue(water_event(&reg, 7.0)).unwrap();
        let snapshot = queue.snapshot();
        let mut sockets: SlotMap<SocketId, Socket> = SlotMap::with_key();
        let mut ctx = UnitContext {
            registry: &reg,
            queue: &mut queue,
            snapshot: &snapshot,
            outlets: &[],
            sockets: &mut sockets,
        };
        let result = unit.process(&mut ctx).unwrap();
        assert_eq!(result.consumed, fixed(7.0));
        assert!(queue.is_empty());
        assert_eq!(unit, Unit::Sink(Sink { consumed: fixed(7.0) }));
    }

    #[test]
    fn splitter_sets_complementary_fractions() {
        let reg = water_fiber_registry();
        let mut sockets: SlotMap<SocketId, Socket> = SlotMap::with_key();
        let a = sockets.insert(outlet(Capacity::Unbounded));
        let b = sockets.insert(outlet(Capacity::Unbounded));
        let mut queue = EventQueue::new();
        let snapshot = QueueSnapshot::default();
        let mut unit = Unit::Splitter(Splitter { split: fixed(0.25) });
        let outlets = [a, b];
        let mut ctx = UnitContext {
            registry: &reg,
            queue: &mut queue,
            snapshot: &snapshot,
            outlets: &outlets,
            sockets: &mut sockets,
        };
        unit.process(&mut ctx).unwrap();
        assert_eq!(sockets[a].flow_fractions(), Some(&[fixed(0.25), fixed(0.25)][..]));
        assert_eq!(sockets[b].flow_fractions(), Some(&[fixed(0.75), fixed(0.75)][..]));
    }

    #[test]
    fn sink_consumed_saturates() {
        let reg = water_fiber_registry();
        let mut unit = Unit::Sink(Sink { consumed: Fixed64::MAX - fixed(1.0) });
        let mut queue = EventQueue::new();
        queue.enqueue(water_event(&reg, 1.0e9)).unwrap();
        let snapshot = queue.snapshot();
        let mut sockets: SlotMap<SocketId, Socket> = SlotMap::with_key();
        let mut ctx = UnitContext {
            registry: &reg,
            queue: &mut queue,
            snapshot: &snapshot,
            outlets: &[],
            sockets: &mut sockets,
        };
        let result = unit.process(&mut ctx).unwrap();
        assert_eq!(result.consumed, fixed(1.0e9));
        assert_eq!(unit, Unit::Sink(Sink { consumed: Fixed64::MAX }));
    }
}
