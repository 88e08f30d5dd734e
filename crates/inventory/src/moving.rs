use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wms_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, MovingId, ReserveId, WarehouseId,
};
use wms_events::Event;

use crate::address::Address;

/// Moving status lifecycle: `New` → `Delivering` → `Finished`, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovingStatus {
    New,
    Delivering,
    Finished,
}

/// Transit of a completed reserve from its warehouse to the order destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveMoving {
    id: MovingId,
    reserve_id: ReserveId,
    warehouse_id: WarehouseId,
    destination: Address,
    status: MovingStatus,
    version: u64,
}

impl ReserveMoving {
    pub fn new(
        id: MovingId,
        reserve_id: ReserveId,
        warehouse_id: WarehouseId,
        destination: Address,
    ) -> Self {
        Self {
            id,
            reserve_id,
            warehouse_id,
            destination,
            status: MovingStatus::New,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> MovingId {
        self.id
    }

    pub fn reserve_id(&self) -> ReserveId {
        self.reserve_id
    }

    /// The warehouse the goods leave from.
    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn status(&self) -> MovingStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == MovingStatus::Finished
    }

    pub fn start(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        self.execute(&MovingCommand::Start(StartMoving {
            moving_id: self.id,
            occurred_at,
        }))?;
        Ok(())
    }

    pub fn finish(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        self.execute(&MovingCommand::Finish(FinishMoving {
            moving_id: self.id,
            occurred_at,
        }))?;
        Ok(())
    }
}

impl AggregateRoot for ReserveMoving {
    type Id = MovingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: StartMoving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMoving {
    pub moving_id: MovingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinishMoving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishMoving {
    pub moving_id: MovingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovingCommand {
    Start(StartMoving),
    Finish(FinishMoving),
}

/// Event: MovingStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingStarted {
    pub moving_id: MovingId,
    pub reserve_id: ReserveId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovingFinished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingFinished {
    pub moving_id: MovingId,
    pub reserve_id: ReserveId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovingEvent {
    MovingStarted(MovingStarted),
    MovingFinished(MovingFinished),
}

impl MovingEvent {
    pub fn moving_id(&self) -> MovingId {
        match self {
            MovingEvent::MovingStarted(e) => e.moving_id,
            MovingEvent::MovingFinished(e) => e.moving_id,
        }
    }
}

impl Event for MovingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MovingEvent::MovingStarted(_) => "inventory.moving.started",
            MovingEvent::MovingFinished(_) => "inventory.moving.finished",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MovingEvent::MovingStarted(e) => e.occurred_at,
            MovingEvent::MovingFinished(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ReserveMoving {
    type Command = MovingCommand;
    type Event = MovingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MovingEvent::MovingStarted(_) => {
                self.status = MovingStatus::Delivering;
            }
            MovingEvent::MovingFinished(_) => {
                self.status = MovingStatus::Finished;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MovingCommand::Start(cmd) => {
                self.ensure_moving_id(cmd.moving_id)?;
                if self.status != MovingStatus::New {
                    return Err(DomainError::invalid_transition(
                        "reserve moving",
                        self.status,
                        "start",
                    ));
                }
                Ok(vec![MovingEvent::MovingStarted(MovingStarted {
                    moving_id: self.id,
                    reserve_id: self.reserve_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            MovingCommand::Finish(cmd) => {
                self.ensure_moving_id(cmd.moving_id)?;
                if self.status != MovingStatus::Delivering {
                    return Err(DomainError::invalid_transition(
                        "reserve moving",
                        self.status,
                        "finish",
                    ));
                }
                Ok(vec![MovingEvent::MovingFinished(MovingFinished {
                    moving_id: self.id,
                    reserve_id: self.reserve_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl ReserveMoving {
    fn ensure_moving_id(&self, moving_id: MovingId) -> Result<(), DomainError> {
        if self.id != moving_id {
            return Err(DomainError::invariant("moving_id mismatch"));
        }
        Ok(())
    }
}
