use crate::domain::model::{GuestDetails, InstitutionId, RoomId, VisitId};

/// 来訪エンティティ
/// 1回の入室に紐づく宿泊客情報。予約作成時に生成され、キャンセル処理でのみ無効化される
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    id: VisitId,
    institution_id: InstitutionId,
    room_id: RoomId,
    guest: GuestDetails,
    cancelled: bool,
}

impl Visit {
    pub fn new(
        id: VisitId,
        institution_id: InstitutionId,
        room_id: RoomId,
        guest: GuestDetails,
    ) -> Self {
        Self {
            id,
            institution_id,
            room_id,
            guest,
            cancelled: false,
        }
    }

    /// データベースから取得したデータで来訪を再構築
    pub fn reconstruct(
        id: VisitId,
        institution_id: InstitutionId,
        room_id: RoomId,
        guest: GuestDetails,
        cancelled: bool,
    ) -> Self {
        Self {
            id,
            institution_id,
            room_id,
            guest,
            cancelled,
        }
    }

    pub fn id(&self) -> VisitId {
        self.id
    }

    pub fn institution_id(&self) -> InstitutionId {
        self.institution_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn guest(&self) -> &GuestDetails {
        &self.guest
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}
